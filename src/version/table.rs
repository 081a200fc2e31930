//! The static hash → profile table.
//!
//! A handful of entries are pinned test fixtures (the three named samples
//! used throughout the test suite); the rest are representative stand-ins
//! spanning the documented flag space. There is no corpus of real sample
//! binaries in this environment to populate the full ~20-release table the
//! format actually has — see DESIGN.md for that tradeoff.

use super::cid::CidTable;
use super::{FormatFlags, TagStyle, VersionProfile};

pub const SAMPLE_A_HASH: &str = "1ce86630892e2dca9a8543fdb8ed8e22";
pub const SAMPLE_B_HASH: &str = "1441d6b13b8623fa7fbf61433abebd31";
pub const SAMPLE_C_HASH: &str = "7dbbeeb8ef7b91338640dca3927636de";

const V3_9_CIDS: CidTable = CidTable::new(1870, 4096);
const V3_1_CIDS: CidTable = CidTable::new(1720, 4096);
const V2_17_CIDS: CidTable = CidTable::new(1540, 4096);
const V2_10_CIDS: CidTable = CidTable::new(1480, 4096);

struct Entry {
    hash: &'static str,
    profile: VersionProfile,
}

static TABLE: &[Entry] = &[
    Entry {
        hash: SAMPLE_A_HASH,
        profile: VersionProfile {
            dart_version: "3.10.7",
            supported: true,
            tag_style: TagStyle::ObjectHeader,
            header_fields: 5,
            cid_table: V3_9_CIDS,
            flags: FormatFlags {
                pre_v32_format: false,
                fill_ref_unsigned: false,
                old_type_scalars: false,
                has_type_param_class_id: true,
                type_param_byte_scalars: false,
                old_string_format: false,
                old_pool_format: false,
                pool_type_swapped: false,
                code_state_bits_after_ref: false,
                split_canonical_clusters: false,
            },
        },
    },
    Entry {
        hash: SAMPLE_B_HASH,
        profile: VersionProfile {
            dart_version: "2.17.6",
            supported: true,
            tag_style: TagStyle::CidShift1,
            header_fields: 6,
            cid_table: V2_17_CIDS,
            flags: FormatFlags {
                pre_v32_format: true,
                fill_ref_unsigned: true,
                old_type_scalars: true,
                has_type_param_class_id: false,
                type_param_byte_scalars: true,
                old_string_format: true,
                old_pool_format: true,
                pool_type_swapped: false,
                code_state_bits_after_ref: false,
                split_canonical_clusters: false,
            },
        },
    },
    Entry {
        hash: SAMPLE_C_HASH,
        profile: VersionProfile {
            dart_version: "3.1.0",
            supported: true,
            tag_style: TagStyle::CidShift1,
            header_fields: 5,
            cid_table: V3_1_CIDS,
            flags: FormatFlags {
                pre_v32_format: true,
                fill_ref_unsigned: false,
                old_type_scalars: false,
                has_type_param_class_id: true,
                type_param_byte_scalars: false,
                old_string_format: false,
                old_pool_format: false,
                pool_type_swapped: true,
                code_state_bits_after_ref: false,
                split_canonical_clusters: false,
            },
        },
    },
    // 2.10.4: earliest supported release, 4-field header, split canonical form.
    Entry {
        hash: "9f1c1e8b6a6e22a9e4f6c1c9d6e9a111",
        profile: VersionProfile {
            dart_version: "2.10.4",
            supported: true,
            tag_style: TagStyle::CidShift1,
            header_fields: 4,
            cid_table: V2_10_CIDS,
            flags: FormatFlags {
                pre_v32_format: true,
                fill_ref_unsigned: true,
                old_type_scalars: true,
                has_type_param_class_id: false,
                type_param_byte_scalars: true,
                old_string_format: true,
                old_pool_format: true,
                pool_type_swapped: false,
                code_state_bits_after_ref: false,
                split_canonical_clusters: true,
            },
        },
    },
    // 2.13.0: the release carrying the open-question CodeStateBitsAfterRef flag.
    Entry {
        hash: "2e9b9e2a1d7f4c3b9a5e6f7d8c9b0a13",
        profile: VersionProfile {
            dart_version: "2.13.0",
            supported: true,
            tag_style: TagStyle::CidShift1,
            header_fields: 4,
            cid_table: V2_10_CIDS,
            flags: FormatFlags {
                pre_v32_format: true,
                fill_ref_unsigned: true,
                old_type_scalars: true,
                has_type_param_class_id: false,
                type_param_byte_scalars: true,
                old_string_format: true,
                old_pool_format: true,
                pool_type_swapped: false,
                code_state_bits_after_ref: true,
                split_canonical_clusters: true,
            },
        },
    },
    // 3.0.0: known hash, but this release's profile is intentionally
    // unsupported, exercising the known-but-unsupported halt path.
    Entry {
        hash: "5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c00",
        profile: VersionProfile {
            dart_version: "3.0.0",
            supported: false,
            tag_style: TagStyle::CidShift1,
            header_fields: 5,
            cid_table: V3_1_CIDS,
            flags: FormatFlags::new_default(),
        },
    },
];

impl FormatFlags {
    const fn new_default() -> FormatFlags {
        FormatFlags {
            pre_v32_format: true,
            fill_ref_unsigned: false,
            old_type_scalars: false,
            has_type_param_class_id: false,
            type_param_byte_scalars: false,
            old_string_format: false,
            old_pool_format: false,
            pool_type_swapped: false,
            code_state_bits_after_ref: false,
            split_canonical_clusters: false,
        }
    }
}

/// Look up a known hash, returning its pinned profile verbatim.
pub fn lookup(snapshot_hash: &str) -> Option<VersionProfile> {
    TABLE
        .iter()
        .find(|entry| entry.hash == snapshot_hash)
        .map(|entry| entry.profile)
}

/// The profile returned by the unknown-hash probe once a tag style has been
/// accepted. `dart_version` is left empty, marking the profile as probed
/// rather than looked up (§8 scenario 5).
pub fn probed_profile(tag_style: TagStyle) -> VersionProfile {
    VersionProfile {
        dart_version: "",
        supported: true,
        tag_style,
        header_fields: 5,
        cid_table: V3_9_CIDS,
        flags: FormatFlags {
            pre_v32_format: false,
            fill_ref_unsigned: false,
            old_type_scalars: false,
            has_type_param_class_id: true,
            type_param_byte_scalars: false,
            old_string_format: false,
            old_pool_format: false,
            pool_type_swapped: false,
            code_state_bits_after_ref: false,
            split_canonical_clusters: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pinned_hashes_are_found() {
        assert!(lookup(SAMPLE_A_HASH).is_some());
        assert!(lookup(SAMPLE_B_HASH).is_some());
        assert!(lookup(SAMPLE_C_HASH).is_some());
    }

    #[test]
    fn unknown_hash_is_absent() {
        assert!(lookup("00000000000000000000000000000000").is_none());
    }
}
