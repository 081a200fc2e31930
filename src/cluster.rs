//! Walks the clustered header and the first of the two per-cluster passes:
//! the allocation record for every CID in the snapshot (§4.3).

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::options::{ParseMode, ParseOptions, StepBudget};
use crate::version::cid::Cid;
use crate::version::{DecodedTag, VersionProfile};

/// The shape an allocation body takes, dispatched purely on CID (§9
/// "Polymorphism over CIDs" — no per-cluster subclasses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocKind {
    Simple,
    Instance,
    TypedData,
    TypedDataView,
    StringFamily,
    MapSet,
    ArrayFamily,
}

/// Pure dispatch function mapping a CID to its allocation kind.
pub fn alloc_kind_for(cid: Cid, cid_table: &crate::version::cid::CidTable) -> AllocKind {
    use crate::version::cid;
    if cid_table.typed_data_index(cid).is_some() {
        return if cid >= cid::TYPED_DATA_VIEW_BASE {
            AllocKind::TypedDataView
        } else {
            AllocKind::TypedData
        };
    }
    match cid {
        cid::ONE_BYTE_STRING | cid::TWO_BYTE_STRING => AllocKind::StringFamily,
        cid::LINKED_HASH_MAP | cid::LINKED_HASH_SET => AllocKind::MapSet,
        cid::ARRAY | cid::GROWABLE_OBJECT_ARRAY => AllocKind::ArrayFamily,
        cid::INSTANCE => AllocKind::Instance,
        _ if cid >= cid_table.num_predefined_cids => AllocKind::Instance,
        _ => AllocKind::Simple,
    }
}

/// The clustered header preceding the per-cluster records. Field presence
/// is entirely determined by `VersionProfile::header_fields` (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct ClusterHeader {
    pub num_base_objects: u64,
    pub num_objects: u64,
    pub num_clusters: u64,
    pub instructions_table_len: u64,
    pub instruction_table_data_offset: Option<u64>,
    pub initial_field_table_len: Option<u64>,
}

fn read_header(cursor: &mut Cursor<'_>, profile: &VersionProfile) -> Result<ClusterHeader> {
    let num_base_objects = cursor.read_unsigned()?;
    let initial_field_table_len = if profile.header_fields >= 6 {
        Some(cursor.read_unsigned()?)
    } else {
        None
    };
    let num_objects = cursor.read_unsigned()?;
    let num_clusters = cursor.read_unsigned()?;
    let instructions_table_len = cursor.read_unsigned()?;
    let instruction_table_data_offset = if profile.header_fields >= 5 {
        Some(cursor.read_unsigned()?)
    } else {
        None
    };

    Ok(ClusterHeader {
        num_base_objects,
        num_objects,
        num_clusters,
        instructions_table_len,
        instruction_table_data_offset,
        initial_field_table_len,
    })
}

/// One allocation record: a CID's tag plus the reference-id range it claims.
#[derive(Debug, Clone, Copy)]
pub struct ClusterMeta {
    pub index: usize,
    pub cid: Cid,
    pub canonical: bool,
    pub immutable: bool,
    pub count: u64,
    pub start_ref: u64,
    pub stop_ref: u64,
    pub file_offset: usize,
    pub kind: AllocKind,
    /// Only meaningful for [`AllocKind::Instance`].
    pub instance_size_words: Option<u32>,
    /// Only meaningful for [`AllocKind::TypedData`].
    pub typed_data_stride: Option<u32>,
}

/// The clustered header plus the ordered allocation records that follow it.
#[derive(Debug, Clone)]
pub struct ClusterSet {
    pub header: ClusterHeader,
    pub clusters: Vec<ClusterMeta>,
    /// Byte offset of the start of the fill section: the allocation section
    /// (clustered header + every `ClusterMeta`'s allocation body) and the
    /// fill section are two back-to-back regions (§2, §4.3/§4.4), and the
    /// fill reader walks the same clusters a second time starting here, not
    /// at the first allocation record's offset.
    pub fill_start_offset: usize,
}

fn read_alloc_body(
    cursor: &mut Cursor<'_>,
    kind: AllocKind,
) -> Result<(u64, Option<u32>, Option<u32>)> {
    match kind {
        AllocKind::Simple | AllocKind::TypedDataView => {
            let count = cursor.read_unsigned()?;
            Ok((count, None, None))
        }
        AllocKind::Instance => {
            let instance_size_words = cursor.read_unsigned()? as u32;
            let count = cursor.read_unsigned()?;
            for _ in 0..count {
                cursor.read_unsigned()?; // next-field-offset per instance
            }
            Ok((count, Some(instance_size_words), None))
        }
        AllocKind::TypedData => {
            let count = cursor.read_unsigned()?;
            let stride = cursor.read_unsigned()? as u32;
            Ok((count, None, Some(stride)))
        }
        AllocKind::StringFamily => {
            let count = cursor.read_unsigned()?;
            for _ in 0..count {
                cursor.read_unsigned()?; // per-string length (encoding flag in low bit)
            }
            Ok((count, None, None))
        }
        AllocKind::MapSet => {
            let count = cursor.read_unsigned()?;
            for _ in 0..count {
                cursor.read_unsigned()?; // per-map size
            }
            Ok((count, None, None))
        }
        AllocKind::ArrayFamily => {
            let count = cursor.read_unsigned()?;
            for _ in 0..count {
                cursor.read_unsigned()?; // per-array length
            }
            Ok((count, None, None))
        }
    }
}

/// Scan the clustered header and every cluster's allocation record.
///
/// `data` is the full data region; `clustered_offset` is the byte offset at
/// which the clustered header begins (`SnapshotHeader::clustered_data_offset`).
pub fn scan(
    data: &[u8],
    clustered_offset: usize,
    profile: &VersionProfile,
    options: &ParseOptions,
) -> Result<ClusterSet> {
    let mut cursor = Cursor::at(data, clustered_offset);
    let header = read_header(&mut cursor, profile)?;

    #[cfg(feature = "log")]
    log::debug!(
        "clustered header: base_objects={} objects={} clusters={}",
        header.num_base_objects,
        header.num_objects,
        header.num_clusters
    );

    let mut clusters = Vec::with_capacity(header.num_clusters as usize);
    let mut next_ref = header.num_base_objects + 1;
    let mut budget = StepBudget::new(options.max_steps);

    for index in 0..header.num_clusters {
        if let Err(err) = budget.tick() {
            if options.parse_mode == ParseMode::BestEffort {
                #[cfg(feature = "log")]
                log::warn!("cluster scan stopped at record {index}: {err}");
                break;
            }
            return Err(err);
        }

        let file_offset = cursor.position();
        let tag_result = profile.tag_style.decode(&mut cursor);

        let DecodedTag {
            cid,
            canonical,
            immutable,
        } = match tag_result {
            Ok(tag) => tag,
            Err(err) => {
                if options.parse_mode == ParseMode::BestEffort {
                    #[cfg(feature = "log")]
                    log::warn!("cluster scan stopped at record {index}: {err}");
                    break;
                }
                return Err(err);
            }
        };

        let canonical = if profile.flags.split_canonical_clusters {
            index < header.num_clusters / 2
        } else {
            canonical
        };

        if !profile.cid_table.plausible(cid) {
            let err = Error::CidOutOfRange { cid };
            if options.parse_mode == ParseMode::BestEffort {
                #[cfg(feature = "log")]
                log::warn!("cluster scan stopped at record {index}: {err}");
                break;
            }
            return Err(err);
        }

        let kind = alloc_kind_for(cid, &profile.cid_table);
        let (count, instance_size_words, typed_data_stride) =
            match read_alloc_body(&mut cursor, kind) {
                Ok(body) => body,
                Err(err) => {
                    if options.parse_mode == ParseMode::BestEffort {
                        #[cfg(feature = "log")]
                        log::warn!("cluster scan stopped at record {index}: {err}");
                        break;
                    }
                    return Err(err);
                }
            };

        let start_ref = next_ref;
        let stop_ref = start_ref + count;
        next_ref = stop_ref;

        #[cfg(feature = "log")]
        log::trace!(
            "cluster[{index}]: cid={cid} canonical={canonical} immutable={immutable} count={count} [{start_ref}, {stop_ref})"
        );

        clusters.push(ClusterMeta {
            index: index as usize,
            cid,
            canonical,
            immutable,
            count,
            start_ref,
            stop_ref,
            file_offset,
            kind,
            instance_size_words,
            typed_data_stride,
        });
    }

    #[cfg(feature = "log")]
    log::debug!(
        "cluster scan complete: {} clusters, {} objects allocated",
        clusters.len(),
        next_ref.saturating_sub(header.num_base_objects + 1)
    );

    let fill_start_offset = cursor.position();

    Ok(ClusterSet {
        header,
        clusters,
        fill_start_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::table;

    fn four_field_profile() -> VersionProfile {
        table::lookup(table::SAMPLE_A_HASH).unwrap()
    }

    #[test]
    fn reads_simple_cluster_and_assigns_contiguous_refs() {
        let profile = four_field_profile();
        // Header (5 fields, per sample A's profile): base_objects=0,
        // num_objects=0 (placeholder), num_clusters=1, instr_table_len=0,
        // instr_table_offset=0. One cluster: ObjectHeader tag for CID 14
        // ("Function", dispatches to Simple), count=3.
        let mut bytes = vec![0x80, 0x80, 0x81, 0x80, 0x80];
        let value: i64 = 14 << 12;
        let mut remaining = value;
        loop {
            let group = remaining & 0x7f;
            remaining >>= 7;
            if remaining == 0 {
                bytes.push((group + 192) as u8);
                break;
            } else {
                bytes.push(group as u8);
            }
        }
        bytes.push(0x83); // count = 3

        let set = scan(&bytes, 0, &profile, &ParseOptions::strict()).unwrap();
        assert_eq!(set.header.num_objects, 0);
        assert_eq!(set.clusters.len(), 1);
        assert_eq!(set.clusters[0].cid, 14);
        assert_eq!(set.clusters[0].count, 3);
        assert_eq!(set.clusters[0].start_ref, 1);
        assert_eq!(set.clusters[0].stop_ref, 4);
    }

    /// Two identical `cid=14, count=3` cluster records, preceded by a
    /// 5-field header declaring `num_clusters=2`.
    fn two_cluster_bytes() -> Vec<u8> {
        let mut bytes = vec![0x80, 0x80, 0x82, 0x80, 0x80];
        for _ in 0..2 {
            let value: i64 = 14 << 12;
            let mut remaining = value;
            loop {
                let group = remaining & 0x7f;
                remaining >>= 7;
                if remaining == 0 {
                    bytes.push((group + 192) as u8);
                    break;
                } else {
                    bytes.push(group as u8);
                }
            }
            bytes.push(0x83); // count = 3
        }
        bytes
    }

    #[test]
    fn exhausted_step_budget_halts_in_best_effort_mode() {
        let profile = four_field_profile();
        let bytes = two_cluster_bytes();

        // Budget allows only the first cluster's tick; the second is never read.
        let options = ParseOptions::best_effort().with_max_steps(1);
        let set = scan(&bytes, 0, &profile, &options).unwrap();
        assert_eq!(set.clusters.len(), 1);
    }

    #[test]
    fn exhausted_step_budget_aborts_in_strict_mode() {
        let profile = four_field_profile();
        let bytes = two_cluster_bytes();

        let options = ParseOptions::strict().with_max_steps(1);
        let err = scan(&bytes, 0, &profile, &options).unwrap_err();
        assert!(matches!(err, Error::BudgetExhausted));
    }
}
