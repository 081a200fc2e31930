//! ELF64 file header, trimmed to the fields this crate actually consults.

use scroll::{Pread, Pwrite, SizeWith, LE};

use crate::error::{Error, Result};

/// File class byte index within `e_ident`.
pub const EI_CLASS: usize = 4;
/// Data encoding byte index within `e_ident`.
pub const EI_DATA: usize = 5;
/// 64-bit objects.
pub const ELFCLASS64: u8 = 2;
/// 2's complement, little endian.
pub const ELFDATA2LSB: u8 = 1;
/// Number of bytes in the identification block.
pub const SIZEOF_IDENT: usize = 16;
/// The ELF magic number.
pub const ELFMAG: [u8; 4] = *b"\x7FELF";

/// AArch64 machine id (`e_machine`).
pub const EM_AARCH64: u16 = 183;
/// Shared object file (`e_type`).
pub const ET_DYN: u16 = 3;

/// Size of the fixed ELF64 header.
pub const SIZEOF_EHDR: usize = 64;

/// The fixed-width tail of the ELF64 header, i.e. everything after
/// `e_ident`. The identification bytes are validated byte-by-byte first
/// (magic, class, data encoding) before this part is decoded as a unit —
/// the same "peek, then derive-parse the rest" split the teacher's
/// `elf::header::impure::peek` plus `_64::header64::Header` pair uses.
#[derive(Debug, Clone, Copy, Default, Pread, Pwrite, SizeWith)]
#[repr(C)]
pub struct HeaderTail {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// A parsed ELF64 header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub e_ident: [u8; SIZEOF_IDENT],
    pub tail: HeaderTail,
}

impl core::ops::Deref for Header {
    type Target = HeaderTail;

    fn deref(&self) -> &HeaderTail {
        &self.tail
    }
}

impl Header {
    /// Validate the identification block and decode the rest of the header.
    ///
    /// Rejects anything that is not ELF64, little-endian, `EM_AARCH64` —
    /// this loader is the minimal concrete instance of the `ElfImage`
    /// contract this crate needs, not a general-purpose ELF toolkit.
    pub fn parse(bytes: &[u8]) -> Result<Header> {
        if bytes.len() < SIZEOF_EHDR {
            return Err(Error::Truncated {
                wanted: SIZEOF_EHDR,
                offset: 0,
                len: bytes.len(),
            });
        }
        let mut e_ident = [0u8; SIZEOF_IDENT];
        e_ident.copy_from_slice(&bytes[0..SIZEOF_IDENT]);

        if e_ident[0..4] != ELFMAG {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&e_ident[0..4]);
            return Err(Error::BadMagic(magic));
        }
        if e_ident[EI_CLASS] != ELFCLASS64 {
            return Err(Error::UnsupportedContainer("not ELF64"));
        }
        if e_ident[EI_DATA] != ELFDATA2LSB {
            return Err(Error::UnsupportedContainer("not little-endian"));
        }

        let mut offset = SIZEOF_IDENT;
        let tail: HeaderTail = bytes.gread_with(&mut offset, LE)?;

        if tail.e_machine != EM_AARCH64 {
            return Err(Error::UnsupportedContainer("not EM_AARCH64"));
        }

        Ok(Header { e_ident, tail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_header(e_phnum: u16, e_shnum: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; SIZEOF_EHDR];
        bytes[0..4].copy_from_slice(&ELFMAG);
        bytes[EI_CLASS] = ELFCLASS64;
        bytes[EI_DATA] = ELFDATA2LSB;
        let tail = HeaderTail {
            e_type: ET_DYN,
            e_machine: EM_AARCH64,
            e_version: 1,
            e_entry: 0,
            e_phoff: SIZEOF_EHDR as u64,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: SIZEOF_EHDR as u16,
            e_phentsize: 56,
            e_phnum,
            e_shentsize: 64,
            e_shnum,
            e_shstrndx: 0,
        };
        let mut offset = SIZEOF_IDENT;
        bytes.gwrite_with(tail, &mut offset, LE).unwrap();
        bytes
    }

    #[test]
    fn parses_well_formed_header() {
        let bytes = synthetic_header(2, 5);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.e_machine, EM_AARCH64);
        assert_eq!(header.e_phnum, 2);
        assert_eq!(header.e_shnum, 5);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = synthetic_header(0, 0);
        bytes[0] = 0;
        assert!(matches!(Header::parse(&bytes), Err(Error::BadMagic(_))));
    }

    #[test]
    fn rejects_non_aarch64() {
        let mut bytes = synthetic_header(0, 0);
        let machine_offset = SIZEOF_IDENT + 2; // e_machine field, after e_type
        bytes[machine_offset] = 0x3e; // EM_X86_64
        bytes[machine_offset + 1] = 0;
        assert!(matches!(
            Header::parse(&bytes),
            Err(Error::UnsupportedContainer(_))
        ));
    }
}
