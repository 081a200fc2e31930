//! Walks each cluster's fill body: per-object reference and scalar fields,
//! populating the reconstructed side-tables fill owns (§4.4).

use crate::cluster::{AllocKind, ClusterMeta, ClusterSet};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::objects::{
    ClassInfo, CodeEntry, FieldInfo, FuncTypeInfo, NamedObject, PoolEntry, PooledString,
    ReferenceId,
};
use crate::options::{ParseMode, ParseOptions, StepBudget};
use crate::version::cid::{self, Cid};
use crate::version::VersionProfile;

/// A scalar field's wire width, read in the order the fill specification
/// for a CID declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    U8,
    U16,
    U32,
    Unsigned,
}

/// Which CID-specific side effect a fill record feeds, beyond the generic
/// ref/scalar bookkeeping every object gets (§4.4 "For specific CIDs...").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillKind {
    String,
    NamedObject,
    Code,
    ObjectPool,
    Mint,
    Field,
    FuncTypeInfo,
    Generic,
}

/// The fill specification for one CID: how many references and scalars of
/// which widths to read per object, and which side effect to run.
///
/// Computed purely from `(cid, profile.flags)` — the "`spec_for(cid,
/// profile)`" dispatch function named in the design notes, kept as data
/// rather than per-CID subclasses.
#[derive(Debug, Clone, Copy)]
struct FillSpec {
    num_refs: u32,
    scalars: &'static [ScalarType],
    kind: FillKind,
}

fn spec_for(cid: Cid, profile: &VersionProfile) -> FillSpec {
    use ScalarType::*;

    match cid {
        cid::ONE_BYTE_STRING | cid::TWO_BYTE_STRING => FillSpec {
            num_refs: 0,
            scalars: &[Unsigned],
            kind: FillKind::String,
        },
        cid::FUNCTION => FillSpec {
            num_refs: 2,
            scalars: if profile.flags.pre_v32_format { &[U32] } else { &[U32, U32] },
            kind: FillKind::NamedObject,
        },
        cid::CLASS => FillSpec {
            num_refs: 2,
            scalars: &[U16, U32],
            kind: FillKind::NamedObject,
        },
        cid::LIBRARY | cid::SCRIPT | cid::NAMESPACE => FillSpec {
            num_refs: 2,
            scalars: &[U8],
            kind: FillKind::NamedObject,
        },
        cid::PATCH_CLASS => FillSpec {
            num_refs: if profile.flags.pre_v32_format { 3 } else { 2 },
            scalars: &[],
            kind: FillKind::NamedObject,
        },
        cid::CODE => FillSpec {
            num_refs: 2,
            scalars: &[Unsigned],
            kind: FillKind::Code,
        },
        cid::OBJECT_POOL => FillSpec {
            num_refs: 0,
            scalars: &[Unsigned],
            kind: FillKind::ObjectPool,
        },
        cid::MINT => FillSpec {
            num_refs: 0,
            scalars: &[Unsigned],
            kind: FillKind::Mint,
        },
        cid::FIELD => FillSpec {
            num_refs: 2,
            scalars: &[Unsigned],
            kind: FillKind::Field,
        },
        cid::TYPE_PARAMETER => FillSpec {
            num_refs: if profile.flags.has_type_param_class_id { 1 } else { 0 },
            scalars: if profile.flags.type_param_byte_scalars { &[U8, U8] } else { &[Unsigned, Unsigned] },
            kind: FillKind::FuncTypeInfo,
        },
        cid::FUNCTION_TYPE => FillSpec {
            num_refs: 1,
            scalars: &[Unsigned, Unsigned],
            kind: FillKind::FuncTypeInfo,
        },
        _ => FillSpec {
            num_refs: 1,
            scalars: &[],
            kind: FillKind::Generic,
        },
    }
}

fn read_reference(cursor: &mut Cursor<'_>, profile: &VersionProfile) -> Result<ReferenceId> {
    let raw = if profile.flags.fill_ref_unsigned {
        cursor.read_unsigned()?
    } else {
        (cursor.read_tagged_64()? >> 1) as u64
    };
    Ok(ReferenceId(raw as u32))
}

fn read_scalar(cursor: &mut Cursor<'_>, ty: ScalarType) -> Result<i64> {
    Ok(match ty {
        ScalarType::U8 => cursor.read_u8()? as i64,
        ScalarType::U16 => cursor.read_u16()? as i64,
        ScalarType::U32 => cursor.read_u32()? as i64,
        ScalarType::Unsigned => cursor.read_unsigned()? as i64,
    })
}

/// All side-tables reconstructed by one fill pass.
#[derive(Debug, Clone, Default)]
pub struct FillTables {
    pub strings: Vec<PooledString>,
    pub named: Vec<NamedObject>,
    pub codes: Vec<CodeEntry>,
    pub pool: Vec<PoolEntry>,
    pub class_infos: Vec<ClassInfo>,
    pub field_infos: Vec<FieldInfo>,
    pub func_types: Vec<FuncTypeInfo>,
    /// Sparse integer values for Mint/Smi objects, indexed by reference id;
    /// used later to resolve field byte offsets.
    pub small_ints: Vec<Option<i64>>,
}

impl FillTables {
    fn with_capacity(num_objects: usize) -> FillTables {
        FillTables {
            small_ints: vec![None; num_objects + 1],
            ..Default::default()
        }
    }

    fn record_small_int(&mut self, ref_id: ReferenceId, value: i64) {
        let idx = ref_id.0 as usize;
        if idx >= self.small_ints.len() {
            self.small_ints.resize(idx + 1, None);
        }
        self.small_ints[idx] = Some(value);
    }
}

fn check_reference(reference: ReferenceId, num_objects: u64) -> Result<()> {
    if reference.0 as u64 > num_objects {
        return Err(Error::ReferenceOutOfRange {
            reference: reference.0,
            num_objects: num_objects as u32,
        });
    }
    Ok(())
}

fn fill_one_cluster(
    cursor: &mut Cursor<'_>,
    cluster: &ClusterMeta,
    profile: &VersionProfile,
    num_objects: u64,
    tables: &mut FillTables,
    budget: &mut StepBudget,
) -> Result<()> {
    let spec = spec_for(cluster.cid, profile);

    // One class, one layout: an Instance cluster's `cid` is the class itself,
    // shared by every object in it, so the class-layout record is pushed once
    // here rather than once per fill iteration below.
    if cluster.kind == AllocKind::Instance {
        tables.class_infos.push(ClassInfo {
            ref_id: ReferenceId(cluster.cid as u32),
            class_id: cluster.cid,
            instance_size_words: cluster.instance_size_words.unwrap_or(0),
            name_ref: ReferenceId::NULL,
        });
    }

    for object_index in 0..cluster.count {
        budget.tick()?;
        let ref_id = ReferenceId((cluster.start_ref + object_index) as u32);

        let mut refs = Vec::with_capacity(spec.num_refs as usize);
        for _ in 0..spec.num_refs {
            let r = read_reference(cursor, profile)?;
            check_reference(r, num_objects)?;
            refs.push(r);
        }

        let mut scalars = Vec::with_capacity(spec.scalars.len());
        for &ty in spec.scalars {
            scalars.push(read_scalar(cursor, ty)?);
        }

        match spec.kind {
            FillKind::String => {
                let length = scalars.first().copied().unwrap_or(0);
                let is_one_byte = length & 1 == 0;
                let byte_len = (length >> 1).max(0) as usize;
                let unit = if is_one_byte { 1 } else { 2 };
                let raw = cursor.read_bytes(byte_len * unit)?;
                let value = if is_one_byte {
                    String::from_utf8_lossy(raw).into_owned()
                } else {
                    let units: Vec<u16> = raw
                        .chunks_exact(2)
                        .map(|c| u16::from_le_bytes([c[0], c[1]]))
                        .collect();
                    String::from_utf16_lossy(&units)
                };
                tables.strings.push(PooledString {
                    ref_id,
                    value,
                    is_one_byte,
                });
            }
            FillKind::NamedObject => {
                tables.named.push(NamedObject {
                    ref_id,
                    cid: cluster.cid,
                    name_ref: refs.first().copied().unwrap_or(ReferenceId::NULL),
                    owner_ref: refs.get(1).copied(),
                    signature_ref: refs.get(2).copied(),
                });
            }
            FillKind::Code => {
                tables.codes.push(CodeEntry {
                    ref_id,
                    owner_ref: refs.first().copied().unwrap_or(ReferenceId::NULL),
                    pc_offset_index: scalars.first().copied().unwrap_or(0) as u32,
                });
            }
            FillKind::ObjectPool => {
                let slot_count = scalars.first().copied().unwrap_or(0) as u64;
                for _ in 0..slot_count {
                    let tag = if profile.flags.old_pool_format {
                        cursor.read_u8()? & 0x3
                    } else {
                        cursor.read_u8()? & 0x7
                    };
                    let (ref_tag, imm_tag) = if profile.flags.pool_type_swapped {
                        (0u8, 1u8)
                    } else {
                        (1u8, 0u8)
                    };
                    let entry = if tag == ref_tag {
                        let r = read_reference(cursor, profile)?;
                        check_reference(r, num_objects)?;
                        PoolEntry::Tagged(r)
                    } else if tag == imm_tag {
                        PoolEntry::Immediate(cursor.read_tagged_64()?)
                    } else if tag == 2 {
                        PoolEntry::Native(cursor.read_tagged_64()?)
                    } else {
                        PoolEntry::Empty
                    };
                    tables.pool.push(entry);
                }
            }
            FillKind::Mint => {
                let value = scalars.first().copied().unwrap_or(0);
                tables.record_small_int(ref_id, value);
            }
            FillKind::Field => {
                tables.field_infos.push(FieldInfo {
                    owner_ref: refs.first().copied().unwrap_or(ReferenceId::NULL),
                    name_ref: refs.get(1).copied().unwrap_or(ReferenceId::NULL),
                    host_offset_ref: ReferenceId(scalars.first().copied().unwrap_or(0) as u32),
                });
            }
            FillKind::FuncTypeInfo => {
                tables.func_types.push(FuncTypeInfo {
                    ref_id,
                    num_fixed: scalars.first().copied().unwrap_or(0) as u32,
                    num_optional: scalars.get(1).copied().unwrap_or(0) as u32,
                });
            }
            FillKind::Generic => {}
        }
    }

    Ok(())
}

/// Run the fill pass over every cluster in `set`, in allocation order.
pub fn fill(
    data: &[u8],
    set: &ClusterSet,
    profile: &VersionProfile,
    options: &ParseOptions,
) -> Result<FillTables> {
    let mut cursor = Cursor::at(data, set.fill_start_offset);
    let mut tables = FillTables::with_capacity(set.header.num_objects as usize);
    let mut budget = StepBudget::new(options.max_steps);

    for cluster in &set.clusters {
        #[cfg(feature = "log")]
        log::trace!(
            "fill cluster[{}]: cid={} count={}",
            cluster.index,
            cluster.cid,
            cluster.count
        );
        let before = cursor.position();
        let result = fill_one_cluster(&mut cursor, cluster, profile, set.header.num_objects, &mut tables, &mut budget);
        if let Err(err) = result {
            #[cfg(feature = "log")]
            log::error!(
                "fill drift at cluster[{}] cid={} object_index≈{} offset={}: {err}",
                cluster.index,
                cluster.cid,
                cursor.position().saturating_sub(before),
                cursor.position()
            );
            if options.parse_mode == ParseMode::BestEffort {
                return Ok(tables);
            }
            return Err(err);
        }
        #[cfg(feature = "log")]
        log::debug!(
            "fill cluster[{}] done: {} objects, {} bytes consumed",
            cluster.index,
            cluster.count,
            cursor.position() - before
        );
    }

    Ok(tables)
}

/// Number of header words every heap object carries before its first field
/// (the object's tag word). Field offsets are counted from the end of this
/// header, per §4.4 "Class-layout resolution".
const OBJECT_HEADER_WORDS: u32 = 1;

/// Join [`ClassInfo`], [`FieldInfo`], and the small-integer table into fully
/// resolved byte-offset layouts (§4.4 "Class-layout resolution (post-fill)").
///
/// For each reconstructed class, explicit [`FieldInfo`] records are
/// preferred: their `host_offset_ref` is dereferenced against
/// [`FillTables::small_ints`] and multiplied by `word_size` to get a byte
/// offset. Classes with no explicit field records synthesize one
/// `f_0x<offset>` slot per word between the object header and
/// `instance_size_words * word_size`.
pub fn resolve_class_layouts(tables: &FillTables, word_size: u32) -> Vec<crate::objects::ResolvedClassLayout> {
    use crate::objects::{ResolvedClassLayout, ResolvedField};

    let name_of = |ref_id: ReferenceId| -> Option<String> {
        tables
            .strings
            .iter()
            .find(|s| s.ref_id == ref_id)
            .map(|s| s.value.clone())
    };

    tables
        .class_infos
        .iter()
        .map(|class| {
            let mut fields: Vec<ResolvedField> = tables
                .field_infos
                .iter()
                .filter(|f| f.owner_ref == class.ref_id)
                .map(|f| {
                    let offset_words = tables
                        .small_ints
                        .get(f.host_offset_ref.0 as usize)
                        .copied()
                        .flatten()
                        .unwrap_or(0) as u32;
                    ResolvedField {
                        name: name_of(f.name_ref).unwrap_or_else(|| format!("f_0x{:x}", offset_words * word_size)),
                        byte_offset: offset_words * word_size,
                    }
                })
                .collect();

            if fields.is_empty() {
                let instance_size_bytes = class.instance_size_words * word_size;
                let header_bytes = OBJECT_HEADER_WORDS * word_size;
                let mut offset = header_bytes;
                while offset < instance_size_bytes {
                    fields.push(ResolvedField {
                        name: format!("f_0x{offset:x}"),
                        byte_offset: offset,
                    });
                    offset += word_size;
                }
            } else {
                fields.sort_by_key(|f| f.byte_offset);
            }

            ResolvedClassLayout {
                class_ref: class.ref_id,
                name: name_of(class.name_ref),
                instance_size_bytes: class.instance_size_words * word_size,
                fields,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterHeader;
    use crate::version::table;

    fn profile() -> VersionProfile {
        table::lookup(table::SAMPLE_A_HASH).unwrap()
    }

    #[test]
    fn fills_a_one_byte_string_cluster() {
        let profile = profile();
        // One OneByteString object, length tag = 6 (3 chars, one-byte flag
        // clear), followed by the raw bytes "abc".
        let mut bytes = vec![0x86]; // unsigned VLE for 6: 6 | 0x80
        bytes.extend_from_slice(b"abc");

        let cluster = ClusterMeta {
            index: 0,
            cid: cid::ONE_BYTE_STRING,
            canonical: false,
            immutable: true,
            count: 1,
            start_ref: 2,
            stop_ref: 3,
            file_offset: 0,
            kind: AllocKind::StringFamily,
            instance_size_words: None,
            typed_data_stride: None,
        };
        let set = ClusterSet {
            header: ClusterHeader {
                num_base_objects: 1,
                num_objects: 2,
                num_clusters: 1,
                instructions_table_len: 0,
                instruction_table_data_offset: None,
                initial_field_table_len: None,
            },
            clusters: vec![cluster],
            fill_start_offset: 0,
        };

        let tables = fill(&bytes, &set, &profile, &ParseOptions::strict()).unwrap();
        assert_eq!(tables.strings.len(), 1);
        assert_eq!(tables.strings[0].value, "abc");
        assert!(tables.strings[0].is_one_byte);
        assert_eq!(tables.strings[0].ref_id, ReferenceId(2));
    }

    #[test]
    fn out_of_range_reference_aborts_in_strict_mode() {
        let profile = profile();
        // Field cluster with a too-large owner reference.
        let mut bytes = Vec::new();
        // owner ref via CidShift1-unrelated: fill_ref_unsigned for sample A
        // is false, so references use tagged_64 >> 1. Encode ref=999 when
        // only 1 object exists: value = 999 << 1 = 1998.
        let tagged = 999i64 << 1;
        let mut remaining = tagged;
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
        bytes.push(0x80); // name_ref = 0
        bytes.push(0x80); // host_offset scalar = 0

        let cluster = ClusterMeta {
            index: 0,
            cid: cid::FIELD,
            canonical: false,
            immutable: false,
            count: 1,
            start_ref: 2,
            stop_ref: 3,
            file_offset: 0,
            kind: AllocKind::Simple,
            instance_size_words: None,
            typed_data_stride: None,
        };
        let set = ClusterSet {
            header: ClusterHeader {
                num_base_objects: 1,
                num_objects: 2,
                num_clusters: 1,
                instructions_table_len: 0,
                instruction_table_data_offset: None,
                initial_field_table_len: None,
            },
            clusters: vec![cluster],
            fill_start_offset: 0,
        };

        let err = fill(&bytes, &set, &profile, &ParseOptions::strict()).unwrap_err();
        assert!(matches!(err, Error::ReferenceOutOfRange { .. }));
    }

    #[test]
    fn exhausted_step_budget_returns_partial_tables_in_best_effort_mode() {
        let profile = profile();
        // Two OneByteString objects, "a" and "b"; a budget of one tick only
        // lets the first object's fill run.
        let mut bytes = vec![0x82];
        bytes.extend_from_slice(b"a");
        bytes.push(0x82);
        bytes.extend_from_slice(b"b");

        let cluster = ClusterMeta {
            index: 0,
            cid: cid::ONE_BYTE_STRING,
            canonical: false,
            immutable: true,
            count: 2,
            start_ref: 2,
            stop_ref: 4,
            file_offset: 0,
            kind: AllocKind::StringFamily,
            instance_size_words: None,
            typed_data_stride: None,
        };
        let set = ClusterSet {
            header: ClusterHeader {
                num_base_objects: 1,
                num_objects: 3,
                num_clusters: 1,
                instructions_table_len: 0,
                instruction_table_data_offset: None,
                initial_field_table_len: None,
            },
            clusters: vec![cluster],
            fill_start_offset: 0,
        };

        let options = ParseOptions::best_effort().with_max_steps(1);
        let tables = fill(&bytes, &set, &profile, &options).unwrap();
        assert_eq!(tables.strings.len(), 1);
        assert_eq!(tables.strings[0].value, "a");
    }

    #[test]
    fn resolves_explicit_field_offsets() {
        let mut tables = FillTables::default();
        tables.strings.push(crate::objects::PooledString {
            ref_id: ReferenceId(50),
            value: "width".into(),
            is_one_byte: true,
        });
        tables.small_ints = vec![None; 10];
        tables.small_ints[5] = Some(2); // host_offset_ref 5 -> word offset 2
        tables.class_infos.push(ClassInfo {
            ref_id: ReferenceId(20),
            class_id: 300,
            instance_size_words: 4,
            name_ref: ReferenceId::NULL,
        });
        tables.field_infos.push(FieldInfo {
            owner_ref: ReferenceId(20),
            name_ref: ReferenceId(50),
            host_offset_ref: ReferenceId(5),
        });

        let layouts = resolve_class_layouts(&tables, 4);
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].fields.len(), 1);
        assert_eq!(layouts[0].fields[0].name, "width");
        assert_eq!(layouts[0].fields[0].byte_offset, 8);
        assert_eq!(layouts[0].instance_size_bytes, 16);
    }

    #[test]
    fn synthesizes_slot_names_without_explicit_fields() {
        let mut tables = FillTables::default();
        tables.class_infos.push(ClassInfo {
            ref_id: ReferenceId(21),
            class_id: 301,
            instance_size_words: 3,
            name_ref: ReferenceId::NULL,
        });

        let layouts = resolve_class_layouts(&tables, 8);
        // header = 1 word (8 bytes), instance_size = 3 words (24 bytes):
        // synthesized slots at byte offsets 8 and 16.
        assert_eq!(layouts[0].fields.len(), 2);
        assert_eq!(layouts[0].fields[0].name, "f_0x8");
        assert_eq!(layouts[0].fields[1].name, "f_0x10");
    }
}
