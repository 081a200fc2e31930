//! A minimal ELF64/ARM64 loader: the concrete, in-crate implementation of
//! the `ElfImage` contract the region extractor consumes (§4.0).
//!
//! This is deliberately not a general-purpose ELF toolkit. It answers
//! exactly four questions — "where is this symbol", "what file offset does
//! this virtual address land at", "give me N bytes at this offset", and
//! "what are the loadable segments" — because that is all the region
//! extractor ever asks. Callers who need richer ELF introspection implement
//! [`ElfImage`] themselves (e.g. against a fuller loader) instead of relying
//! on this one.

pub mod header;
pub mod program_header;
pub mod section_header;
pub mod sym;

use header::Header;
use program_header::ProgramHeader;
use section_header::SectionHeader;
use sym::Sym;

use crate::error::{Error, Result};

/// The contract the region extractor consumes from an ELF loader.
///
/// `ElfFile` is this crate's own concrete implementation; nothing else in
/// the crate depends on `ElfFile` directly, only on this trait.
pub trait ElfImage {
    /// Resolve a symbol by its exact name, returning `(virtual_address, size)`.
    fn symbol(&self, name: &str) -> Option<(u64, u64)>;

    /// Translate a virtual address to a file offset via the loadable segments.
    fn va_to_file_offset(&self, va: u64) -> Option<u64>;

    /// Bounded read of `len` bytes starting at file `offset`.
    fn read(&self, offset: u64, len: usize) -> Result<&[u8]>;

    /// The loadable (`PT_LOAD`) program headers, for callers that need the
    /// segment a virtual address falls in (e.g. to bound an unsized read).
    fn load_segments(&self) -> &[ProgramHeader];
}

/// A byte-offset indexed string table, as found via `sh_link` from a symbol
/// table section to its companion string table section.
struct Strtab<'a> {
    bytes: &'a [u8],
}

impl<'a> Strtab<'a> {
    fn get(&self, offset: usize) -> &'a str {
        let bytes = &self.bytes[offset.min(self.bytes.len())..];
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        core::str::from_utf8(&bytes[..end]).unwrap_or("")
    }
}

/// A parsed ELF64 ARM64 shared object.
pub struct ElfFile<'a> {
    data: &'a [u8],
    #[allow(dead_code)]
    header: Header,
    program_headers: Vec<ProgramHeader>,
    dynsyms: Vec<Sym>,
    dynstr_offset: usize,
    dynstr_size: usize,
}

impl<'a> ElfFile<'a> {
    /// Parse the ELF header, program headers, and dynamic symbol table
    /// (falling back to the non-dynamic symbol table if the binary has been
    /// stripped of dynamic symbols) out of `data`.
    pub fn parse(data: &'a [u8]) -> Result<ElfFile<'a>> {
        let header = Header::parse(data)?;
        #[cfg(feature = "log")]
        log::debug!(
            "elf header: entry=0x{:x} phoff=0x{:x} shoff=0x{:x} phnum={} shnum={}",
            header.e_entry,
            header.e_phoff,
            header.e_shoff,
            header.e_phnum,
            header.e_shnum
        );

        let program_headers = program_header::parse(data, header.e_phoff as usize, header.e_phnum as usize)?;

        let section_headers = if header.e_shoff == 0 || header.e_shnum == 0 {
            Vec::new()
        } else {
            section_header::parse(data, header.e_shoff as usize, header.e_shnum as usize)?
        };

        let (dynsyms, dynstr_offset, dynstr_size) =
            Self::load_symbols(data, &section_headers, section_header::SHT_DYNSYM)
                .or_else(|| Self::load_symbols(data, &section_headers, section_header::SHT_SYMTAB))
                .unwrap_or_default();

        Ok(ElfFile {
            data,
            header,
            program_headers,
            dynsyms,
            dynstr_offset,
            dynstr_size,
        })
    }

    fn load_symbols(
        data: &[u8],
        sections: &[SectionHeader],
        want_type: u32,
    ) -> Option<(Vec<Sym>, usize, usize)> {
        let symtab = sections.iter().find(|s| s.sh_type == want_type)?;
        let strtab = sections.get(symtab.sh_link as usize)?;
        if strtab.sh_type != section_header::SHT_STRTAB {
            return None;
        }
        let count = (symtab.sh_size as usize) / core::mem::size_of::<Sym>().max(24);
        let syms = sym::parse(data, symtab.sh_offset as usize, count).ok()?;
        Some((syms, strtab.sh_offset as usize, strtab.sh_size as usize))
    }

    fn strtab(&self) -> Strtab<'a> {
        let end = (self.dynstr_offset + self.dynstr_size).min(self.data.len());
        let start = self.dynstr_offset.min(end);
        Strtab {
            bytes: &self.data[start..end],
        }
    }
}

impl<'a> ElfImage for ElfFile<'a> {
    fn symbol(&self, name: &str) -> Option<(u64, u64)> {
        let strtab = self.strtab();
        self.dynsyms
            .iter()
            .find(|sym| strtab.get(sym.st_name as usize) == name)
            .map(|sym| (sym.st_value, sym.st_size))
    }

    fn va_to_file_offset(&self, va: u64) -> Option<u64> {
        self.program_headers
            .iter()
            .find(|phdr| phdr.contains_va(va))
            .map(|phdr| phdr.va_to_file_offset(va))
    }

    fn read(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let offset = offset as usize;
        let end = offset.checked_add(len).ok_or(Error::Truncated {
            wanted: len,
            offset,
            len: self.data.len(),
        })?;
        self.data.get(offset..end).ok_or(Error::Truncated {
            wanted: len,
            offset,
            len: self.data.len(),
        })
    }

    fn load_segments(&self) -> &[ProgramHeader] {
        &self.program_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use header::{ELFCLASS64, ELFDATA2LSB, ELFMAG, EM_AARCH64, EI_CLASS, EI_DATA, SIZEOF_EHDR, SIZEOF_IDENT, ET_DYN};
    use program_header::{ProgramHeader as Phdr, PT_LOAD};
    use scroll::{Pwrite, LE};

    /// Build a tiny, self-contained ELF64/ARM64 image: header, one PT_LOAD
    /// segment covering the whole file, no sections (dynamic symbol lookup
    /// degrades gracefully to an empty table).
    fn synthetic_elf() -> Vec<u8> {
        let phoff = SIZEOF_EHDR;
        let total_len = phoff + ProgramHeader::SIZEOF;

        let mut bytes = vec![0u8; total_len];
        bytes[0..4].copy_from_slice(&ELFMAG);
        bytes[EI_CLASS] = ELFCLASS64;
        bytes[EI_DATA] = ELFDATA2LSB;

        let tail = header::HeaderTail {
            e_type: ET_DYN,
            e_machine: EM_AARCH64,
            e_version: 1,
            e_entry: 0x1000,
            e_phoff: phoff as u64,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: SIZEOF_EHDR as u16,
            e_phentsize: ProgramHeader::SIZEOF as u16,
            e_phnum: 1,
            e_shentsize: 0,
            e_shnum: 0,
            e_shstrndx: 0,
        };
        let mut offset = SIZEOF_IDENT;
        bytes.gwrite_with(tail, &mut offset, LE).unwrap();

        let phdr = Phdr {
            p_type: PT_LOAD,
            p_flags: 5,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: total_len as u64,
            p_memsz: total_len as u64,
            p_align: 0x1000,
        };
        let mut offset = phoff;
        bytes.gwrite_with(phdr, &mut offset, LE).unwrap();

        bytes
    }

    #[test]
    fn parses_minimal_image_and_maps_va() {
        let bytes = synthetic_elf();
        let elf = ElfFile::parse(&bytes).unwrap();
        assert_eq!(elf.va_to_file_offset(0x10), Some(0x10));
        assert_eq!(elf.load_segments().len(), 1);
    }

    #[test]
    fn unresolved_symbol_is_none_not_a_panic() {
        let bytes = synthetic_elf();
        let elf = ElfFile::parse(&bytes).unwrap();
        assert_eq!(elf.symbol("_kDartVmSnapshotData"), None);
    }
}
