//! ELF logical size estimation.
//!
//! An AppImage runtime is an ordinary ELF executable with the squashfs image
//! appended right after the content the ELF itself declares. The declared end
//! is the larger of the section header table end and the furthest section
//! end. Decoding goes through goblin over byte slices, so only the file
//! header and the section table are ever read from disk.

use std::{fs::File, os::unix::fs::FileExt};

use goblin::{
    container::{Container, Ctx},
    elf::{
        header::{
            header32, header64, Header, EI_CLASS, EI_DATA, ELFCLASS32, ELFCLASS64, ELFDATA2LSB,
            ELFDATA2MSB, SIZEOF_IDENT,
        },
        section_header::{section_header32, section_header64, SectionHeader},
    },
};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::{detect::ELF_MAGIC_BYTES, endian::Endian};

#[derive(Error, Diagnostic, Debug)]
pub enum ElfError {
    #[error("Not an ELF file")]
    #[diagnostic(code(appicon::elf::not_elf))]
    NotElf,

    #[error("Unsupported ELF class {0}")]
    #[diagnostic(code(appicon::elf::class))]
    UnsupportedClass(u8),

    #[error("Unsupported ELF data encoding {0}")]
    #[diagnostic(code(appicon::elf::encoding))]
    UnsupportedEncoding(u8),

    #[error("ELF has no section header table")]
    #[diagnostic(code(appicon::elf::no_sections))]
    NoSectionTable,

    #[error("Section header entry size {entsize} is smaller than {minimum}")]
    #[diagnostic(code(appicon::elf::entsize))]
    BadEntrySize { entsize: u16, minimum: u16 },

    #[error("ELF data truncated: needed {needed} bytes, have {available}")]
    #[diagnostic(code(appicon::elf::truncated))]
    Truncated { needed: u64, available: u64 },

    #[error("ELF offsets overflow")]
    #[diagnostic(code(appicon::elf::overflow))]
    Overflow,

    #[error("Malformed ELF headers: {0}")]
    #[diagnostic(code(appicon::elf::malformed))]
    Malformed(#[from] goblin::error::Error),

    #[error("Failed to read ELF data: {0}")]
    #[diagnostic(code(appicon::elf::io))]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    /// Size of the file header.
    pub fn header_size(self) -> usize {
        match self {
            ElfClass::Elf32 => header32::SIZEOF_EHDR,
            ElfClass::Elf64 => header64::SIZEOF_EHDR,
        }
    }

    /// Minimum size of one section header entry.
    pub fn section_header_size(self) -> u16 {
        match self {
            ElfClass::Elf32 => section_header32::SIZEOF_SHDR as u16,
            ElfClass::Elf64 => section_header64::SIZEOF_SHDR as u16,
        }
    }

    fn container(self) -> Container {
        match self {
            ElfClass::Elf32 => Container::Little,
            ElfClass::Elf64 => Container::Big,
        }
    }
}

/// The section table location, as declared by the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElfHeader {
    pub class: ElfClass,
    pub endian: Endian,
    pub shoff: u64,
    pub shentsize: u16,
    pub shnum: u16,
}

impl ElfHeader {
    /// Byte length of the section header table.
    pub fn table_len(&self) -> u64 {
        u64::from(self.shentsize) * u64::from(self.shnum)
    }

    /// End offset of the section header table.
    pub fn table_end(&self) -> Result<u64, ElfError> {
        self.shoff
            .checked_add(self.table_len())
            .ok_or(ElfError::Overflow)
    }

    fn ctx(&self) -> Ctx {
        let endian = match self.endian {
            Endian::Little => goblin::container::Endian::Little,
            Endian::Big => goblin::container::Endian::Big,
        };
        Ctx::new(self.class.container(), endian)
    }
}

/// Header fields plus the computed logical size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElfGeometry {
    #[serde(flatten)]
    pub header: ElfHeader,
    pub max_section_end: u64,
    pub logical_size: u64,
}

fn truncated(needed: usize, available: usize) -> ElfError {
    ElfError::Truncated {
        needed: needed as u64,
        available: available as u64,
    }
}

/// Decodes the file header. The identification bytes are checked first so
/// a bad class or encoding is reported as such.
pub fn parse_header(bytes: &[u8]) -> Result<ElfHeader, ElfError> {
    if bytes.len() < SIZEOF_IDENT {
        return Err(truncated(SIZEOF_IDENT, bytes.len()));
    }
    if bytes[..4] != ELF_MAGIC_BYTES {
        return Err(ElfError::NotElf);
    }

    let class = match bytes[EI_CLASS] {
        ELFCLASS32 => ElfClass::Elf32,
        ELFCLASS64 => ElfClass::Elf64,
        other => return Err(ElfError::UnsupportedClass(other)),
    };
    let endian = match bytes[EI_DATA] {
        ELFDATA2LSB => Endian::Little,
        ELFDATA2MSB => Endian::Big,
        other => return Err(ElfError::UnsupportedEncoding(other)),
    };

    if bytes.len() < class.header_size() {
        return Err(truncated(class.header_size(), bytes.len()));
    }

    let parsed: Header = goblin::elf::Elf::parse_header(bytes)?;
    let (shoff, shentsize, shnum) = (parsed.e_shoff, parsed.e_shentsize, parsed.e_shnum);

    if shoff == 0 || shentsize == 0 || shnum == 0 {
        return Err(ElfError::NoSectionTable);
    }
    if shentsize < class.section_header_size() {
        return Err(ElfError::BadEntrySize {
            entsize: shentsize,
            minimum: class.section_header_size(),
        });
    }

    Ok(ElfHeader {
        class,
        endian,
        shoff,
        shentsize,
        shnum,
    })
}

/// Computes the logical size from a parsed header and the raw section
/// header table (starting at `shoff`).
pub fn compute_geometry(header: ElfHeader, table: &[u8]) -> Result<ElfGeometry, ElfError> {
    let table_len = header.table_len();
    if (table.len() as u64) < table_len {
        return Err(ElfError::Truncated {
            needed: table_len,
            available: table.len() as u64,
        });
    }

    let ctx = header.ctx();
    let entsize = usize::from(header.shentsize);
    let table_len = usize::try_from(table_len).map_err(|_| ElfError::Overflow)?;

    // goblin treats a zero table offset as "no sections", so the table is
    // framed behind one empty entry and every entry sits at a non-zero offset.
    let mut framed = vec![0u8; entsize + table_len];
    framed[entsize..].copy_from_slice(&table[..table_len]);

    let mut max_section_end = 0u64;
    // One entry per parse so a padded `e_shentsize` stride is honored.
    for index in 1..=usize::from(header.shnum) {
        for section in SectionHeader::parse(&framed, index * entsize, 1, ctx)? {
            let end = section
                .sh_offset
                .checked_add(section.sh_size)
                .ok_or(ElfError::Overflow)?;
            max_section_end = max_section_end.max(end);
        }
    }

    let table_end = header.table_end()?;
    Ok(ElfGeometry {
        header,
        max_section_end,
        logical_size: table_end.max(max_section_end),
    })
}

/// Computes the geometry of an ELF image held fully in memory.
pub fn geometry_from_bytes(image: &[u8]) -> Result<ElfGeometry, ElfError> {
    let header = parse_header(image)?;
    let start = usize::try_from(header.shoff).map_err(|_| ElfError::Overflow)?;
    let end = usize::try_from(header.table_end()?).map_err(|_| ElfError::Overflow)?;
    let table = image.get(start..end).ok_or_else(|| truncated(end, image.len()))?;
    compute_geometry(header, table)
}

/// Computes the geometry of the ELF at the start of `file`, reading only the
/// file header and the section header table.
pub fn read_geometry(file: &File, file_size: u64) -> Result<ElfGeometry, ElfError> {
    let mut head = [0u8; header64::SIZEOF_EHDR];
    let head_len = head.len().min(usize::try_from(file_size).unwrap_or(usize::MAX));
    file.read_exact_at(&mut head[..head_len], 0)?;
    let header = parse_header(&head[..head_len])?;

    let table_end = header.table_end()?;
    if table_end > file_size {
        return Err(ElfError::Truncated {
            needed: table_end,
            available: file_size,
        });
    }

    let mut table = vec![0u8; usize::try_from(header.table_len()).map_err(|_| ElfError::Overflow)?];
    file.read_exact_at(&mut table, header.shoff)?;
    compute_geometry(header, &table)
}
