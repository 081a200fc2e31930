//! ELF64 program header table, used only to translate virtual addresses to
//! file offsets (`ElfImage::va_to_file_offset`).

use scroll::{Pread, Pwrite, SizeWith, LE};

use crate::error::Result;

/// Loadable program segment.
pub const PT_LOAD: u32 = 1;

/// One ELF64 program header entry.
#[derive(Debug, Clone, Copy, Default, Pread, Pwrite, SizeWith)]
#[repr(C)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl ProgramHeader {
    /// Size in bytes of one ELF64 program header entry.
    pub const SIZEOF: usize = 56;

    /// Whether `va` falls within this segment's mapped virtual address range.
    pub fn contains_va(&self, va: u64) -> bool {
        self.p_type == PT_LOAD && va >= self.p_vaddr && va < self.p_vaddr + self.p_memsz
    }

    /// Translate a virtual address known to fall in this segment to a file offset.
    pub fn va_to_file_offset(&self, va: u64) -> u64 {
        self.p_offset + (va - self.p_vaddr)
    }

    /// Bytes remaining in the segment's file image starting at `va`.
    pub fn remaining_from(&self, va: u64) -> u64 {
        let consumed = va - self.p_vaddr;
        self.p_filesz.saturating_sub(consumed)
    }
}

/// Parse `count` consecutive program headers starting at `offset`.
pub fn parse(bytes: &[u8], mut offset: usize, count: usize) -> Result<Vec<ProgramHeader>> {
    let mut phdrs = Vec::with_capacity(count);
    for _ in 0..count {
        let phdr: ProgramHeader = bytes.gread_with(&mut offset, LE)?;
        phdrs.push(phdr);
    }
    Ok(phdrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn va_translation_within_segment() {
        let phdr = ProgramHeader {
            p_type: PT_LOAD,
            p_vaddr: 0x1000,
            p_offset: 0x500,
            p_memsz: 0x2000,
            p_filesz: 0x2000,
            ..Default::default()
        };
        assert!(phdr.contains_va(0x1500));
        assert!(!phdr.contains_va(0x3001));
        assert_eq!(phdr.va_to_file_offset(0x1500), 0x500 + 0x500);
    }
}
