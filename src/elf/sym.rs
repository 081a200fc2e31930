//! ELF64 symbol table entries.

use scroll::{Pread, Pwrite, SizeWith, LE};

use crate::error::Result;

/// One ELF64 symbol table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
#[repr(C)]
pub struct Sym {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

/// Parse `count` consecutive symbol table entries starting at `offset`.
pub fn parse(bytes: &[u8], mut offset: usize, count: usize) -> Result<Vec<Sym>> {
    let mut syms = Vec::with_capacity(count);
    for _ in 0..count {
        let sym: Sym = bytes.gread_with(&mut offset, LE)?;
        syms.push(sym);
    }
    Ok(syms)
}
