//! ELF64 section header table, used to locate `.dynsym`/`.dynstr` (falling
//! back to `.symtab`/`.strtab`) for symbol lookup.

use scroll::{Pread, Pwrite, SizeWith, LE};

use crate::error::Result;

/// Dynamic linking symbol table.
pub const SHT_DYNSYM: u32 = 11;
/// Symbol table (non-dynamic).
pub const SHT_SYMTAB: u32 = 2;
/// String table.
pub const SHT_STRTAB: u32 = 3;

/// One ELF64 section header entry.
#[derive(Debug, Clone, Copy, Default, Pread, Pwrite, SizeWith)]
#[repr(C)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

/// Parse `count` consecutive section headers starting at `offset`.
pub fn parse(bytes: &[u8], mut offset: usize, count: usize) -> Result<Vec<SectionHeader>> {
    let mut shdrs = Vec::with_capacity(count);
    for _ in 0..count {
        let shdr: SectionHeader = bytes.gread_with(&mut offset, LE)?;
        shdrs.push(shdr);
    }
    Ok(shdrs)
}
