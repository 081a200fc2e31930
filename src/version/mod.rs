//! Maps a snapshot header's 32-character hash to the decode rules for that
//! runtime release (§4.2).

pub mod cid;
pub mod table;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use cid::CidTable;

/// How a cluster tag's bits are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStyle {
    /// Signed variable-length integer; the raw value is the CID.
    CidInt32,
    /// 64-bit tagged VLE; `CID = value >> 1`, `canonical = value & 1`.
    CidShift1,
    /// 32-bit tagged VLE; `CID`, `canonical`, and `immutable` are all
    /// packed into one value.
    ObjectHeader,
}

/// One decoded cluster tag.
#[derive(Debug, Clone, Copy)]
pub struct DecodedTag {
    pub cid: cid::Cid,
    pub canonical: bool,
    pub immutable: bool,
}

impl TagStyle {
    /// Decode one tag from `cursor` in this style.
    pub fn decode(self, cursor: &mut Cursor<'_>) -> Result<DecodedTag> {
        match self {
            TagStyle::CidInt32 => {
                let value = cursor.read_signed()?;
                Ok(DecodedTag {
                    cid: value,
                    canonical: false,
                    immutable: false,
                })
            }
            TagStyle::CidShift1 => {
                let value = cursor.read_tagged_64()?;
                Ok(DecodedTag {
                    cid: value >> 1,
                    canonical: value & 1 != 0,
                    immutable: false,
                })
            }
            TagStyle::ObjectHeader => {
                let value = cursor.read_tagged_32()? as i64;
                Ok(DecodedTag {
                    cid: (value >> 12) & 0x000F_FFFF,
                    canonical: (value >> 1) & 1 != 0,
                    immutable: (value >> 6) & 1 != 0,
                })
            }
        }
    }
}

/// The ~30 per-cluster format flags that gate fill-reader behavior, named
/// after the specific source-language quirks they paper over (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags {
    /// Header has the pre-3.2 field layout (no `initial_field_table_len`, or
    /// `instruction_table_data_offset`, depending on which side of the cut).
    pub pre_v32_format: bool,
    /// Fill-body reference fields use the unsigned VLE reader rather than
    /// the tagged one.
    pub fill_ref_unsigned: bool,
    /// Older (pre-2.15) type-parameter scalar layout.
    pub old_type_scalars: bool,
    /// Type parameters carry an explicit owning-class CID scalar.
    pub has_type_param_class_id: bool,
    /// Type-parameter scalars are single bytes rather than VLE.
    pub type_param_byte_scalars: bool,
    /// Strings are split into separate one-byte/two-byte cluster kinds
    /// rather than sharing one cluster with an encoding-flag bit.
    pub old_string_format: bool,
    /// Constant pool entries use the pre-3.0 tag layout.
    pub old_pool_format: bool,
    /// Pool entry kind and payload fields are swapped relative to the
    /// current layout.
    pub pool_type_swapped: bool,
    /// Code objects read their state-bits scalar after the first reference
    /// rather than before any references (version 2.13 only; see the open
    /// question in DESIGN.md).
    pub code_state_bits_after_ref: bool,
    /// Versions ≤ 2.13 serialize canonical and non-canonical instances of a
    /// CID as two separate, explicitly-sized cluster loops instead of
    /// encoding the canonical bit in each cluster's tag.
    pub split_canonical_clusters: bool,
}

/// The full set of decode rules for one runtime release.
#[derive(Debug, Clone, Copy)]
pub struct VersionProfile {
    /// Empty when this profile was produced by the unknown-hash probe
    /// rather than a table lookup.
    pub dart_version: &'static str,
    pub supported: bool,
    pub tag_style: TagStyle,
    pub header_fields: u8,
    pub cid_table: CidTable,
    pub flags: FormatFlags,
}

impl VersionProfile {
    pub fn is_probed(&self) -> bool {
        self.dart_version.is_empty()
    }
}

/// Resolve the version profile for a parsed snapshot header.
///
/// `clustered_data` is the region's bytes starting at the clustered header
/// (i.e. `region[header.clustered_data_offset..]`), needed only for the
/// unknown-hash probe path.
pub fn resolve(snapshot_hash: &str, clustered_data: &[u8]) -> Result<VersionProfile> {
    if let Some(profile) = table::lookup(snapshot_hash) {
        if !profile.supported {
            #[cfg(feature = "log")]
            log::warn!("runtime version {} is known but unsupported", profile.dart_version);
            return Err(Error::UnsupportedVersion {
                dart_version: profile.dart_version,
            });
        }
        #[cfg(feature = "log")]
        log::info!(
            "resolved version {} (tag_style={:?}, header_fields={})",
            profile.dart_version,
            profile.tag_style,
            profile.header_fields
        );
        return Ok(profile);
    }

    #[cfg(feature = "log")]
    log::warn!("unrecognized snapshot hash {snapshot_hash}, falling back to tag-style probe");
    probe(clustered_data)
}

/// Probe the stream under each tag style in turn, accepting the first whose
/// decoded first-cluster CID lies in the plausible range `(0, 200)`.
///
/// This is deliberately not the most robust probe possible (see the open
/// question in DESIGN.md): it accepts the first plausible decode rather
/// than cross-checking further clusters.
fn probe(clustered_data: &[u8]) -> Result<VersionProfile> {
    const PLAUSIBLE_MAX: cid::Cid = 200;
    const STYLES: [TagStyle; 3] = [TagStyle::ObjectHeader, TagStyle::CidShift1, TagStyle::CidInt32];

    for style in STYLES {
        let mut cursor = Cursor::new(clustered_data);
        // Skip the clustered header itself: probe only cares about the
        // first byte after it, so advance past the profile-independent
        // minimum of 4 unsigned VLE fields before reading the tag.
        let mut ok = true;
        for _ in 0..4 {
            if cursor.read_unsigned().is_err() {
                ok = false;
                break;
            }
        }
        if !ok {
            continue;
        }
        if let Ok(tag) = style.decode(&mut cursor) {
            if tag.cid > 0 && tag.cid < PLAUSIBLE_MAX {
                #[cfg(feature = "log")]
                log::warn!("probe accepted tag_style={style:?} cid={}", tag.cid);
                return Ok(table::probed_profile(style));
            }
        }
    }

    Err(Error::CidOutOfRange { cid: -1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hash_scenario_a_resolves_object_header() {
        let profile = resolve(table::SAMPLE_A_HASH, &[]).unwrap();
        assert_eq!(profile.tag_style, TagStyle::ObjectHeader);
        assert_eq!(profile.header_fields, 5);
        assert!(!profile.flags.pre_v32_format);
        assert!(!profile.flags.fill_ref_unsigned);
    }

    #[test]
    fn known_hash_scenario_b_resolves_cid_shift1() {
        let profile = resolve(table::SAMPLE_B_HASH, &[]).unwrap();
        assert_eq!(profile.tag_style, TagStyle::CidShift1);
        assert_eq!(profile.header_fields, 6);
        assert!(profile.flags.pre_v32_format);
        assert!(profile.flags.fill_ref_unsigned);
    }

    #[test]
    fn known_hash_scenario_c_resolves_cid_shift1() {
        let profile = resolve(table::SAMPLE_C_HASH, &[]).unwrap();
        assert_eq!(profile.tag_style, TagStyle::CidShift1);
        assert_eq!(profile.header_fields, 5);
        assert!(profile.flags.pre_v32_format);
    }

    #[test]
    fn unrecognized_hash_probes_object_header_for_string_cid() {
        // value = 93 << 12, tagged 32-bit VLE: 0x00, 0x20, 0xD7 (terminal).
        // Preceded by 4 dummy unsigned-VLE header fields (one byte each).
        let data: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x00, 0x20, 0xD7];
        let profile = probe(data).unwrap();
        assert!(profile.is_probed());
    }
}
