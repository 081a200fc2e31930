//! Locates the four well-known exported symbols holding snapshot data and
//! instructions, reads their bytes out of an [`ElfImage`], and parses the
//! fixed header at the front of each.

#[cfg(feature = "sha2")]
use sha2::{Digest, Sha256};

use crate::diagnostics::Diagnostics;
use crate::elf::ElfImage;
use crate::error::{DiagnosticKind, Error, Result};
use crate::options::ParseOptions;
use crate::snapshot::header::{self, InstructionsTable, SnapshotHeader};

/// Instruction regions are frequently reported with a symbol size of zero;
/// when that happens this crate reads up to the containing segment's
/// remaining bytes, capped here so a corrupt or adversarial segment can't
/// force an unbounded allocation.
const MAX_INSTRUCTIONS_REGION: u64 = 256 * 1024 * 1024;

const SYM_VM_DATA: &str = "_kDartVmSnapshotData";
const SYM_VM_INSTRUCTIONS: &str = "_kDartVmSnapshotInstructions";
const SYM_ISOLATE_DATA: &str = "_kDartIsolateSnapshotData";
const SYM_ISOLATE_INSTRUCTIONS: &str = "_kDartIsolateSnapshotInstructions";

/// One binary blob read out of the shared object, plus the bookkeeping
/// needed to explain where it came from.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: &'static str,
    pub virtual_address: u64,
    pub file_offset: u64,
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 digest of `bytes`, when the `sha2` feature is enabled.
    pub content_hash: Option<String>,
}

/// A data region's bytes plus its parsed header.
pub struct DataRegion {
    pub region: Region,
    pub header: SnapshotHeader,
}

/// An instructions region's bytes plus its parsed lookup table.
pub struct InstructionsRegion {
    pub region: Region,
    pub table: InstructionsTable,
}

/// The four regions making up one snapshot file, each independently optional
/// in best-effort mode.
#[derive(Default)]
pub struct Regions {
    pub vm_data: Option<DataRegion>,
    pub vm_instructions: Option<InstructionsRegion>,
    pub isolate_data: Option<DataRegion>,
    pub isolate_instructions: Option<InstructionsRegion>,
}

fn hash_of(bytes: &[u8]) -> Option<String> {
    #[cfg(feature = "sha2")]
    {
        let digest = Sha256::digest(bytes);
        Some(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
    #[cfg(not(feature = "sha2"))]
    {
        let _ = bytes;
        None
    }
}

fn read_data_region(elf: &dyn ElfImage, name: &'static str) -> Result<Region> {
    let (va, size) = elf.symbol(name).ok_or(Error::MissingSymbol(name))?;
    let file_offset = elf
        .va_to_file_offset(va)
        .ok_or(Error::UnmappableRegion { name })?;
    let bytes = elf.read(file_offset, size as usize)?.to_vec();
    let content_hash = hash_of(&bytes);

    #[cfg(feature = "log")]
    log::debug!(
        "region {name}: va=0x{va:x} offset=0x{file_offset:x} len={} sha256={}",
        bytes.len(),
        content_hash.as_deref().unwrap_or("n/a")
    );

    Ok(Region {
        name,
        virtual_address: va,
        file_offset,
        bytes,
        content_hash,
    })
}

fn read_instructions_region(elf: &dyn ElfImage, name: &'static str) -> Result<Region> {
    let (va, declared_size) = elf.symbol(name).ok_or(Error::MissingSymbol(name))?;
    let file_offset = elf
        .va_to_file_offset(va)
        .ok_or(Error::UnmappableRegion { name })?;

    let len = if declared_size > 0 {
        declared_size
    } else {
        let segment = elf
            .load_segments()
            .iter()
            .find(|phdr| phdr.contains_va(va))
            .ok_or(Error::UnmappableRegion { name })?;
        segment.remaining_from(va).min(MAX_INSTRUCTIONS_REGION)
    };

    let bytes = elf.read(file_offset, len as usize)?.to_vec();
    let content_hash = hash_of(&bytes);

    #[cfg(feature = "log")]
    log::debug!(
        "region {name}: va=0x{va:x} offset=0x{file_offset:x} len={} sha256={}",
        bytes.len(),
        content_hash.as_deref().unwrap_or("n/a")
    );

    Ok(Region {
        name,
        virtual_address: va,
        file_offset,
        bytes,
        content_hash,
    })
}

fn try_data_region(
    elf: &dyn ElfImage,
    name: &'static str,
    diagnostics: &mut Diagnostics,
) -> Option<DataRegion> {
    let result = read_data_region(elf, name).and_then(|region| {
        let header = header::parse(&region.bytes)?;
        Ok(DataRegion { region, header })
    });
    match result {
        Ok(data) => Some(data),
        Err(err) => {
            #[cfg(feature = "log")]
            log::warn!("failed to extract region {name}: {err}");
            diagnostics.add(None, DiagnosticKind::Invalid, format!("{name}: {err}"));
            None
        }
    }
}

fn try_instructions_region(
    elf: &dyn ElfImage,
    name: &'static str,
    diagnostics: &mut Diagnostics,
) -> Option<InstructionsRegion> {
    let result = read_instructions_region(elf, name).and_then(|region| {
        let table = header::parse_instructions(&region.bytes)?;
        Ok(InstructionsRegion { region, table })
    });
    match result {
        Ok(data) => Some(data),
        Err(err) => {
            #[cfg(feature = "log")]
            log::warn!("failed to extract region {name}: {err}");
            diagnostics.add(None, DiagnosticKind::Invalid, format!("{name}: {err}"));
            None
        }
    }
}

/// Resolve, read, and parse all four regions from `elf`.
///
/// In strict mode the first failure aborts and returns that error. In
/// best-effort mode each region fails independently: the failure is
/// recorded in `diagnostics` and the corresponding field in [`Regions`] is
/// left `None`.
pub fn extract(
    elf: &dyn ElfImage,
    options: &ParseOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Regions> {
    if options.parse_mode.is_strict() {
        let vm_region = read_data_region(elf, SYM_VM_DATA)?;
        let vm_header = header::parse(&vm_region.bytes)?;
        let vm_instr_region = read_instructions_region(elf, SYM_VM_INSTRUCTIONS)?;
        let vm_instr_table = header::parse_instructions(&vm_instr_region.bytes)?;

        let isolate_region = read_data_region(elf, SYM_ISOLATE_DATA)?;
        let isolate_header = header::parse(&isolate_region.bytes)?;
        let isolate_instr_region = read_instructions_region(elf, SYM_ISOLATE_INSTRUCTIONS)?;
        let isolate_instr_table = header::parse_instructions(&isolate_instr_region.bytes)?;

        return Ok(Regions {
            vm_data: Some(DataRegion {
                region: vm_region,
                header: vm_header,
            }),
            vm_instructions: Some(InstructionsRegion {
                region: vm_instr_region,
                table: vm_instr_table,
            }),
            isolate_data: Some(DataRegion {
                region: isolate_region,
                header: isolate_header,
            }),
            isolate_instructions: Some(InstructionsRegion {
                region: isolate_instr_region,
                table: isolate_instr_table,
            }),
        });
    }

    Ok(Regions {
        vm_data: try_data_region(elf, SYM_VM_DATA, diagnostics),
        vm_instructions: try_instructions_region(elf, SYM_VM_INSTRUCTIONS, diagnostics),
        isolate_data: try_data_region(elf, SYM_ISOLATE_DATA, diagnostics),
        isolate_instructions: try_instructions_region(elf, SYM_ISOLATE_INSTRUCTIONS, diagnostics),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::program_header::ProgramHeader;
    use scroll::{Pwrite, LE};

    struct FakeElf {
        data: Vec<u8>,
        symbols: Vec<(&'static str, u64, u64)>,
        segments: Vec<ProgramHeader>,
    }

    impl ElfImage for FakeElf {
        fn symbol(&self, name: &str) -> Option<(u64, u64)> {
            self.symbols
                .iter()
                .find(|(n, _, _)| *n == name)
                .map(|(_, va, size)| (*va, *size))
        }

        fn va_to_file_offset(&self, va: u64) -> Option<u64> {
            Some(va)
        }

        fn read(&self, offset: u64, len: usize) -> Result<&[u8]> {
            let offset = offset as usize;
            self.data
                .get(offset..offset + len)
                .ok_or(Error::Truncated {
                    wanted: len,
                    offset,
                    len: self.data.len(),
                })
        }

        fn load_segments(&self) -> &[ProgramHeader] {
            &self.segments
        }
    }

    fn synthetic_header_bytes(hash: &str, features: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x34 + features.len() + 1];
        bytes[0..4].copy_from_slice(&header::MAGIC);
        let mut offset = 4usize;
        let body_len = (bytes.len() - 4) as i64;
        bytes.gwrite_with(body_len, &mut offset, LE).unwrap();
        bytes.gwrite_with(3i64, &mut offset, LE).unwrap();
        bytes[0x14..0x14 + hash.len()].copy_from_slice(hash.as_bytes());
        bytes[0x34..0x34 + features.len()].copy_from_slice(features.as_bytes());
        bytes
    }

    #[test]
    fn missing_symbol_is_a_diagnostic_in_best_effort_mode() {
        let elf = FakeElf {
            data: vec![0u8; 16],
            symbols: Vec::new(),
            segments: Vec::new(),
        };
        let options = ParseOptions::best_effort();
        let mut diagnostics = Diagnostics::new();
        let regions = extract(&elf, &options, &mut diagnostics).unwrap();
        assert!(regions.vm_data.is_none());
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn missing_symbol_aborts_in_strict_mode() {
        let elf = FakeElf {
            data: vec![0u8; 16],
            symbols: Vec::new(),
            segments: Vec::new(),
        };
        let options = ParseOptions::strict();
        let mut diagnostics = Diagnostics::new();
        assert!(matches!(
            extract(&elf, &options, &mut diagnostics),
            Err(Error::MissingSymbol(_))
        ));
    }

    #[test]
    fn resolves_and_parses_a_data_region() {
        let header_bytes = synthetic_header_bytes("0123456789abcdef0123456789abcdef", "arm64");
        let len = header_bytes.len() as u64;
        let elf = FakeElf {
            data: header_bytes,
            symbols: vec![(SYM_VM_DATA, 0, len)],
            segments: Vec::new(),
        };
        let mut diagnostics = Diagnostics::new();
        let region = try_data_region(&elf, SYM_VM_DATA, &mut diagnostics).unwrap();
        assert_eq!(region.header.snapshot_hash, "0123456789abcdef0123456789abcdef");
    }
}
