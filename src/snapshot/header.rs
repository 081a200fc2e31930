//! Fixed-layout headers at the front of each region (§6 "File Formats").
//!
//! Three distinct fixed structures live here: the snapshot data header (at
//! the front of the two `*SnapshotData` regions), the instruction-image
//! header, and the `InstructionsSection` object it points to (both at the
//! front of the two `*SnapshotInstructions` regions).

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// The snapshot magic number, `F5 F5 DC DC`.
pub const MAGIC: [u8; 4] = [0xF5, 0xF5, 0xDC, 0xDC];

/// Length of the ASCII-hex version hash field.
const HASH_LEN: usize = 32;

/// The kind of snapshot a data region holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Full,
    Core,
    FullJit,
    FullAot,
}

impl SnapshotKind {
    fn from_raw(raw: i64) -> Result<SnapshotKind> {
        match raw {
            0 => Ok(SnapshotKind::Full),
            1 => Ok(SnapshotKind::Core),
            2 => Ok(SnapshotKind::FullJit),
            3 => Ok(SnapshotKind::FullAot),
            other => Err(Error::BadSnapshotKind(other)),
        }
    }
}

/// The decoded prefix of a snapshot data region.
#[derive(Debug, Clone)]
pub struct SnapshotHeader {
    /// `length` field from the wire header, plus the 4-byte magic.
    pub total_size: u64,
    pub kind: SnapshotKind,
    /// 32-character ASCII-hex version hash.
    pub snapshot_hash: String,
    /// Space-separated feature tokens, e.g. `"arm64 android compressed-pointers"`.
    pub features: String,
    /// Byte offset, from the start of the region, where clustered data begins.
    pub clustered_data_offset: usize,
}

impl SnapshotHeader {
    /// Whether the space-separated features string names `feature`.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.split(' ').any(|tok| tok == feature)
    }

    /// Whether this snapshot was produced with compressed (4-byte) pointers,
    /// which determines the word size used for `instance_size`/field offsets
    /// (§3 invariants).
    pub fn compressed_pointers(&self) -> bool {
        self.has_feature("compressed-pointers")
    }
}

/// Parse the fixed snapshot header at the front of `region`.
pub fn parse(region: &[u8]) -> Result<SnapshotHeader> {
    let mut cursor = Cursor::new(region);

    let mut magic = [0u8; 4];
    magic.copy_from_slice(cursor.read_bytes(4)?);
    if magic != MAGIC {
        return Err(Error::BadMagic(magic));
    }

    let length = cursor.read_i64()? as u64;
    let kind = SnapshotKind::from_raw(cursor.read_i64()?)?;

    let hash_bytes = cursor.read_bytes(HASH_LEN)?;
    let snapshot_hash = core::str::from_utf8(hash_bytes)
        .map_err(|_| Error::InvalidUtf8)?
        .to_string();

    let features_start = cursor.position();
    let remaining = cursor.read_bytes(cursor.remaining())?;
    let nul_at = remaining
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::UnterminatedFeatures)?;
    let features = core::str::from_utf8(&remaining[..nul_at])
        .map_err(|_| Error::InvalidUtf8)?
        .to_string();
    let clustered_data_offset = features_start + nul_at + 1;

    Ok(SnapshotHeader {
        total_size: length + 4,
        kind,
        snapshot_hash,
        features,
        clustered_data_offset,
    })
}

/// One resolved `(pc_offset, size)` slot for a compiled function's machine
/// code, indexed by `CodeEntry::pc_offset_index`.
#[derive(Debug, Clone, Copy)]
pub struct InstructionsTableEntry {
    pub pc_offset: u32,
    pub size: u32,
}

/// Compact index from code-object ordinal to its instructions slot.
#[derive(Debug, Clone, Default)]
pub struct InstructionsTable {
    entries: Vec<InstructionsTableEntry>,
}

impl InstructionsTable {
    pub fn get(&self, index: u32) -> Option<InstructionsTableEntry> {
        self.entries.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse the instruction-image header and the `InstructionsSection` object
/// it points to, at the front of an instructions region.
///
/// The resulting table is a single-entry placeholder spanning the whole
/// payload; per-function slicing happens later against `CodeEntry` records
/// produced by the fill reader, which is the only consumer of
/// `pc_offset_index`.
pub fn parse_instructions(region: &[u8]) -> Result<InstructionsTable> {
    let mut cursor = Cursor::new(region);
    let _image_size = cursor.read_u64()?;
    let section_offset = cursor.read_u64()? as usize;

    cursor.seek(section_offset);
    let _tags = cursor.read_u64()?;
    let payload_length = cursor.read_u64()?;
    let _bss_offset = cursor.read_u64()?;
    let _relocated_va = cursor.read_u64()?;
    let _build_id_offset = cursor.read_u64()?;

    Ok(InstructionsTable {
        entries: vec![InstructionsTableEntry {
            pc_offset: 0,
            size: payload_length as u32,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::{Pwrite, LE};

    fn synthetic_header(hash: &str, features: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x34 + features.len() + 1];
        bytes[0..4].copy_from_slice(&MAGIC);
        let mut offset = 4usize;
        bytes.gwrite_with(16i64, &mut offset, LE).unwrap();
        bytes.gwrite_with(3i64, &mut offset, LE).unwrap();
        bytes[0x14..0x14 + hash.len()].copy_from_slice(hash.as_bytes());
        bytes[0x34..0x34 + features.len()].copy_from_slice(features.as_bytes());
        bytes
    }

    #[test]
    fn parses_header_scenario_4() {
        let hash = "abcdef0123456789abcdef0123456789";
        let bytes = synthetic_header(hash, "arm64 android compressed-pointers");
        let header = parse(&bytes).unwrap();
        assert_eq!(header.total_size, 20);
        assert_eq!(header.snapshot_hash, hash);
        assert!(header.has_feature("compressed-pointers"));
        assert_eq!(header.kind, SnapshotKind::FullAot);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 64];
        assert!(matches!(parse(&bytes), Err(Error::BadMagic(_))));
    }

    #[test]
    fn unterminated_features_is_an_error() {
        let mut bytes = synthetic_header("0".repeat(32).as_str(), "arm64");
        let len = bytes.len();
        bytes.truncate(len - 1);
        assert!(matches!(parse(&bytes), Err(Error::UnterminatedFeatures)));
    }
}
