//! The top-level entry point: given an [`ElfImage`](crate::elf::ElfImage),
//! run the whole pipeline — region extraction, version resolution, cluster
//! scan, fill — for both the VM and isolate snapshots, and expose the
//! reconstructed side-tables read-only.

pub mod header;

use crate::cluster::{self, ClusterSet};
use crate::diagnostics::Diagnostics;
use crate::elf::ElfImage;
use crate::error::Result;
use crate::fill::{self, FillTables};
use crate::objects::{ReferenceId, ResolvedClassLayout};
use crate::options::ParseOptions;
use crate::region::{self, Regions};
use crate::version::{self, VersionProfile};

/// Word size (in bytes) used for instance sizes and field offsets, which
/// depends on whether the snapshot was built with compressed pointers
/// (§3 invariants).
fn word_size(compressed_pointers: bool) -> u32 {
    if compressed_pointers {
        4
    } else {
        8
    }
}

/// One fully-parsed snapshot half (VM or isolate): its cluster scan and
/// fill products.
pub struct SnapshotHalf {
    pub clusters: ClusterSet,
    pub tables: FillTables,
}

/// The top-level handle joining both snapshot halves under one resolved
/// profile.
pub struct Snapshot {
    pub profile: VersionProfile,
    pub vm: Option<SnapshotHalf>,
    pub isolate: Option<SnapshotHalf>,
    pub diagnostics: Diagnostics,
    /// Whether either snapshot region's features string named
    /// `compressed-pointers`, which fixes the word size used when resolving
    /// class field offsets (§3 invariants).
    pub compressed_pointers: bool,
}

fn parse_half(
    region: &region::DataRegion,
    profile: &VersionProfile,
    options: &ParseOptions,
) -> Result<SnapshotHalf> {
    let clusters = cluster::scan(
        &region.region.bytes,
        region.header.clustered_data_offset,
        profile,
        options,
    )?;
    let tables = fill::fill(&region.region.bytes, &clusters, profile, options)?;
    Ok(SnapshotHalf { clusters, tables })
}

impl Snapshot {
    /// Run the full pipeline against `elf`.
    ///
    /// The version profile is resolved from the VM snapshot's header; both
    /// halves are then scanned and filled under that one profile, since a
    /// single binary never mixes runtime releases between its two
    /// snapshots.
    pub fn parse(elf: &dyn ElfImage, options: &ParseOptions) -> Result<Snapshot> {
        let mut diagnostics = Diagnostics::new();
        let regions: Regions = region::extract(elf, options, &mut diagnostics)?;

        let header_region = regions
            .vm_data
            .as_ref()
            .or(regions.isolate_data.as_ref())
            .ok_or(crate::error::Error::MissingSymbol("_kDartVmSnapshotData"))?;

        let clustered_slice = &header_region.region.bytes[header_region.header.clustered_data_offset..];
        let profile = version::resolve(&header_region.header.snapshot_hash, clustered_slice)?;

        let vm = match &regions.vm_data {
            Some(data) => match parse_half(data, &profile, options) {
                Ok(half) => Some(half),
                Err(err) if options.parse_mode == crate::options::ParseMode::BestEffort => {
                    diagnostics.add(None, crate::error::DiagnosticKind::Inconsistent, format!("vm snapshot: {err}"));
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };

        let isolate = match &regions.isolate_data {
            Some(data) => match parse_half(data, &profile, options) {
                Ok(half) => Some(half),
                Err(err) if options.parse_mode == crate::options::ParseMode::BestEffort => {
                    diagnostics.add(None, crate::error::DiagnosticKind::Inconsistent, format!("isolate snapshot: {err}"));
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };

        let compressed_pointers = header_region.header.compressed_pointers();

        Ok(Snapshot {
            profile,
            vm,
            isolate,
            diagnostics,
            compressed_pointers,
        })
    }

    /// Read-only diagnostics accumulated in best-effort mode.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Resolve every isolate-snapshot class's static layout (§4.4
    /// "Class-layout resolution"): field names joined to byte offsets, or
    /// synthesized `f_0x<offset>` slots for classes with no explicit field
    /// records.
    pub fn class_layouts(&self) -> Vec<ResolvedClassLayout> {
        let Some(isolate) = &self.isolate else {
            return Vec::new();
        };
        fill::resolve_class_layouts(&isolate.tables, word_size(self.compressed_pointers))
    }

    /// Resolve a dotted display name for `ref_id` by walking its owner
    /// chain through the isolate snapshot's named objects
    /// (`Function → Class → Library`, or whatever prefix is available).
    ///
    /// This is a read-only traversal of the reconstructed object graph, not
    /// a cross-reference graph over machine code — see §4.5.
    pub fn display_name(&self, ref_id: ReferenceId) -> Option<String> {
        let isolate = self.isolate.as_ref()?;
        let mut parts = Vec::new();
        let mut current = ref_id;
        let mut guard = 0;

        loop {
            guard += 1;
            if guard > 64 {
                break;
            }
            let named = isolate
                .tables
                .named
                .iter()
                .find(|n| n.ref_id == current)?;
            let name = isolate
                .tables
                .strings
                .iter()
                .find(|s| s.ref_id == named.name_ref)
                .map(|s| s.value.clone())
                .unwrap_or_else(|| format!("{}", named.name_ref));
            parts.push(name);

            match named.owner_ref {
                Some(owner) if !owner.is_null() => current = owner,
                _ => break,
            }
        }

        parts.reverse();
        Some(parts.join("."))
    }
}
