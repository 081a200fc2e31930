//! Reconstructs function, class, and constant-pool identities from the AOT
//! snapshot embedded in an ARM64 shared object, working purely from the
//! snapshot bytes — no disassembly, no ELF-toolkit dependency beyond the
//! minimal loader in [`elf`].
//!
//! The pipeline is strictly sequential: [`region`] locates and reads the
//! four snapshot regions, [`version`] resolves the decode rules for the
//! runtime release that produced them, [`cluster`] walks the allocation
//! records, and [`fill`] walks the fill bodies a second time to populate
//! the reconstructed side-tables. [`snapshot::Snapshot::parse`] drives all
//! four stages and is the crate's main entry point.

pub mod cluster;
pub mod cursor;
pub mod diagnostics;
pub mod elf;
pub mod error;
pub mod fill;
pub mod objects;
pub mod options;
pub mod region;
pub mod snapshot;
pub mod version;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use elf::{ElfFile, ElfImage};
pub use error::{Error, Result};
pub use objects::ResolvedClassLayout;
pub use options::{ParseMode, ParseOptions};
pub use snapshot::Snapshot;

/// A stable textual name for a CID, for display purposes.
///
/// The handful of CIDs this crate names explicitly (§3 "Entities") resolve
/// to a fixed name regardless of version. Anything else is resolved against
/// `cid_table`, since whether a CID denotes a typed-data variant or a
/// user-defined class's dynamically assigned id depends on that version's
/// `num_predefined_cids`/typed-data range (§4.2, §4.3).
pub fn cid_name(cid: version::cid::Cid, cid_table: &version::cid::CidTable) -> String {
    use version::cid;
    match cid {
        cid::CLASS => "Class".to_string(),
        cid::PATCH_CLASS => "PatchClass".to_string(),
        cid::FUNCTION => "Function".to_string(),
        cid::FUNCTION_TYPE => "FunctionType".to_string(),
        cid::FIELD => "Field".to_string(),
        cid::LIBRARY => "Library".to_string(),
        cid::SCRIPT => "Script".to_string(),
        cid::NAMESPACE => "Namespace".to_string(),
        cid::CODE => "Code".to_string(),
        cid::OBJECT_POOL => "ObjectPool".to_string(),
        cid::INSTANCE => "Instance".to_string(),
        cid::MINT => "Mint".to_string(),
        cid::TYPE_PARAMETER => "TypeParameter".to_string(),
        cid::ONE_BYTE_STRING => "OneByteString".to_string(),
        cid::TWO_BYTE_STRING => "TwoByteString".to_string(),
        cid::ARRAY => "Array".to_string(),
        cid::GROWABLE_OBJECT_ARRAY => "GrowableObjectArray".to_string(),
        cid::LINKED_HASH_MAP => "LinkedHashMap".to_string(),
        cid::LINKED_HASH_SET => "LinkedHashSet".to_string(),
        other => match cid_table.typed_data_index(other) {
            Some(index) if other >= cid::TYPED_DATA_VIEW_BASE => format!("TypedDataView<{index}>"),
            Some(index) => format!("TypedData<{index}>"),
            None if other >= cid_table.num_predefined_cids => format!("Instance<cid {other}>"),
            None => format!("cid<{other}>"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use version::cid::CidTable;

    fn table() -> CidTable {
        crate::version::table::lookup(crate::version::table::SAMPLE_A_HASH)
            .unwrap()
            .cid_table
    }

    #[test]
    fn cid_name_resolves_known_cids() {
        assert_eq!(cid_name(version::cid::FUNCTION, &table()), "Function");
    }

    #[test]
    fn cid_name_falls_back_by_cid_table_shape() {
        let t = table();
        assert_eq!(cid_name(t.num_predefined_cids + t.max_user_cids, &t), format!("cid<{}>", t.num_predefined_cids + t.max_user_cids));
        assert_eq!(cid_name(t.num_predefined_cids, &t), format!("Instance<cid {}>", t.num_predefined_cids));
    }
}
