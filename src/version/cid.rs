//! Numeric class IDs (CIDs), the keys everything downstream dispatches on.
//!
//! Real Dart releases renumber a handful of CIDs between versions; this
//! crate does not attempt to track that churn entry-by-entry. Instead every
//! [`CidTable`] in [`super::table`] shares the same named constants, and the
//! one CID that is genuinely version-dependent (`num_predefined_cids`) is a
//! field on the table rather than a constant.

/// A runtime class id. Negative values never occur; `i64` matches the
/// signed wire encoding used by the `CidInt32` tag style.
pub type Cid = i64;

pub const ILLEGAL: Cid = 0;
pub const CLASS: Cid = 12;
pub const PATCH_CLASS: Cid = 13;
pub const FUNCTION: Cid = 14;
pub const FUNCTION_TYPE: Cid = 15;
pub const FIELD: Cid = 16;
pub const LIBRARY: Cid = 42;
pub const SCRIPT: Cid = 44;
pub const NAMESPACE: Cid = 45;
pub const CODE: Cid = 37;
pub const OBJECT_POOL: Cid = 38;
pub const INSTANCE: Cid = 17;
pub const MINT: Cid = 61;
pub const TYPE_PARAMETER: Cid = 23;
pub const ONE_BYTE_STRING: Cid = 92;
pub const TWO_BYTE_STRING: Cid = 93;
pub const ARRAY: Cid = 73;
pub const GROWABLE_OBJECT_ARRAY: Cid = 74;
pub const LINKED_HASH_MAP: Cid = 78;
pub const LINKED_HASH_SET: Cid = 79;
pub const TYPED_DATA_BASE: Cid = 100;
pub const TYPED_DATA_VIEW_BASE: Cid = 140;
pub const TYPED_DATA_STRIDE: Cid = 20;

/// A CID table for one runtime version: the shared named constants above,
/// plus the two fields that actually vary — where predefined CIDs end and
/// how wide the typed-data CID ranges are for this release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidTable {
    pub num_predefined_cids: Cid,
    pub max_user_cids: Cid,
}

impl CidTable {
    pub const fn new(num_predefined_cids: Cid, max_user_cids: Cid) -> CidTable {
        CidTable {
            num_predefined_cids,
            max_user_cids,
        }
    }

    /// Whether `cid` lies in a plausible range for this version at all
    /// (used by both cluster-scan validation and the unknown-hash probe).
    pub fn plausible(&self, cid: Cid) -> bool {
        cid > ILLEGAL && cid < self.num_predefined_cids + self.max_user_cids
    }

    /// Whether `cid` falls in the typed-data CID range, and if so, the
    /// `(cid - base) % stride` index used to distinguish view/external
    /// variants from the base kind (§4.3 tie-breaks).
    pub fn typed_data_index(&self, cid: Cid) -> Option<Cid> {
        if cid >= TYPED_DATA_BASE && cid < TYPED_DATA_VIEW_BASE + TYPED_DATA_STRIDE {
            Some((cid - TYPED_DATA_BASE) % TYPED_DATA_STRIDE)
        } else {
            None
        }
    }
}
