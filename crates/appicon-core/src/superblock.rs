//! Squashfs 4.0 superblock decoding and structural validation.
//!
//! All fields are little-endian regardless of the host. A candidate window is
//! either valid or it is not; callers never learn which check failed.

use std::{fs::File, io, os::unix::fs::FileExt};

use serde::Serialize;

use crate::endian::Endian;

pub const SQUASHFS_MAGIC: u32 = 0x7371_7368;

/// Size of the on-disk superblock.
pub const SUPERBLOCK_SIZE: usize = 96;

pub const MIN_BLOCK_SIZE: u32 = 4 * 1024;
pub const MAX_BLOCK_SIZE: u32 = 1024 * 1024;

/// Table offset meaning "no such table".
pub const NOT_SET: u64 = u64::MAX;

const FLAG_NO_FRAGMENTS: u16 = 0x0010;
const FLAG_COMPRESSOR_OPTIONS: u16 = 0x0400;

const FLAGS_AT: usize = 24;
const FRAGMENT_COUNT_AT: usize = 16;
const FRAGMENT_TABLE_AT: usize = 80;

/// Decoded superblock fields, plus the host offset they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Superblock {
    pub offset: u64,
    pub magic: u32,
    pub inode_count: u32,
    pub block_size: u32,
    pub fragment_count: u32,
    pub compression_id: u16,
    pub block_log: u16,
    pub flags: u16,
    pub version_major: u16,
    pub version_minor: u16,
    pub bytes_used: u64,
}

impl Superblock {
    /// Decodes the fixed layout from `window`. Returns `None` only when the
    /// window is shorter than [`SUPERBLOCK_SIZE`].
    pub fn decode(window: &[u8], offset: u64) -> Option<Self> {
        if window.len() < SUPERBLOCK_SIZE {
            return None;
        }
        let le = Endian::Little;
        Some(Self {
            offset,
            magic: le.read_u32(window, 0)?,
            inode_count: le.read_u32(window, 4)?,
            block_size: le.read_u32(window, 12)?,
            fragment_count: le.read_u32(window, 16)?,
            compression_id: le.read_u16(window, 20)?,
            block_log: le.read_u16(window, 22)?,
            flags: le.read_u16(window, 24)?,
            version_major: le.read_u16(window, 28)?,
            version_minor: le.read_u16(window, 30)?,
            bytes_used: le.read_u64(window, 40)?,
        })
    }

    /// True when every structural check passes for an image inside a host
    /// file of `total_size` bytes.
    pub fn is_valid(&self, total_size: u64) -> bool {
        self.magic == SQUASHFS_MAGIC
            && self.version_major == 4
            && self.version_minor == 0
            && (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size)
            && self.block_size.is_power_of_two()
            && (12..=20).contains(&self.block_log)
            && (1..=6).contains(&self.compression_id)
            && self.inode_count != 0
            && self.bytes_used != 0
            && self
                .offset
                .checked_add(self.bytes_used)
                .is_some_and(|end| end <= total_size)
    }

    pub fn has_compressor_options(&self) -> bool {
        self.flags & FLAG_COMPRESSOR_OPTIONS != 0
    }

    /// Whether file tails may live in shared fragment blocks.
    pub fn declares_fragments(&self) -> bool {
        self.fragment_count != 0 && self.flags & FLAG_NO_FRAGMENTS == 0
    }

    pub fn compression_name(&self) -> &'static str {
        match self.compression_id {
            1 => "gzip",
            2 => "lzma",
            3 => "lzo",
            4 => "xz",
            5 => "lz4",
            6 => "zstd",
            _ => "unknown",
        }
    }
}

/// Rewrites a raw superblock so it declares neither a fragment table nor
/// compressor options. Every other field is left as is.
pub fn strip_optional_tables(window: &mut [u8; SUPERBLOCK_SIZE]) {
    window[FRAGMENT_COUNT_AT..FRAGMENT_COUNT_AT + 4].copy_from_slice(&0u32.to_le_bytes());
    window[FRAGMENT_TABLE_AT..FRAGMENT_TABLE_AT + 8].copy_from_slice(&NOT_SET.to_le_bytes());

    let flags = u16::from_le_bytes([window[FLAGS_AT], window[FLAGS_AT + 1]]);
    let flags = flags & !FLAG_COMPRESSOR_OPTIONS;
    window[FLAGS_AT..FLAGS_AT + 2].copy_from_slice(&flags.to_le_bytes());
}

/// Decodes and validates in one step.
pub fn is_valid_superblock(window: &[u8], offset: u64, total_size: u64) -> bool {
    Superblock::decode(window, offset).is_some_and(|sb| sb.is_valid(total_size))
}

/// Reads the superblock window at `offset` with a positional read.
///
/// Returns `Ok(None)` if fewer than [`SUPERBLOCK_SIZE`] bytes remain.
pub fn read_superblock(file: &File, offset: u64) -> io::Result<Option<Superblock>> {
    let mut window = [0u8; SUPERBLOCK_SIZE];
    match file.read_exact_at(&mut window, offset) {
        Ok(()) => Ok(Superblock::decode(&window, offset)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}
