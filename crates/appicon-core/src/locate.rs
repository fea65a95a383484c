//! Finding the embedded squashfs image inside the host file.

use std::fs::File;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    elf::read_geometry,
    superblock::{read_superblock, Superblock, SUPERBLOCK_SIZE},
};

/// Which step of the search produced the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocateMethod {
    /// The offset equals the ELF's declared logical size.
    ElfSize,
    /// Found by the strided scan.
    Scan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Located {
    pub offset: u64,
    pub method: LocateMethod,
    pub superblock: Superblock,
}

fn valid_at(file: &File, offset: u64, file_size: u64) -> Option<Superblock> {
    match read_superblock(file, offset) {
        Ok(Some(sb)) if sb.is_valid(file_size) => Some(sb),
        Ok(_) => None,
        Err(err) => {
            trace!(offset, error = %err, "superblock read failed");
            None
        }
    }
}

/// Locates the squashfs image, trying the ELF logical size first and a scan
/// at `stride` byte steps second.
///
/// Returns `None` when neither step finds a valid superblock. Offset 0 is
/// never reported since byte 0 of a host file holds the ELF magic.
pub fn locate_squashfs(file: &File, file_size: u64, stride: u64) -> Option<Located> {
    match read_geometry(file, file_size) {
        Ok(geometry) if geometry.logical_size > 0 => {
            let offset = geometry.logical_size;
            if let Some(superblock) = valid_at(file, offset, file_size) {
                debug!(offset, "squashfs found at ELF logical size");
                return Some(Located {
                    offset,
                    method: LocateMethod::ElfSize,
                    superblock,
                });
            }
            debug!(
                offset,
                file_size, "no superblock at ELF logical size, scanning"
            );
        }
        Ok(_) => {}
        Err(err) => debug!(error = %err, "ELF size unavailable, scanning"),
    }

    scan(file, file_size, stride)
}

/// Checks every `stride`-aligned offset from 0 up to the last position a
/// full superblock window fits.
pub fn scan(file: &File, file_size: u64, stride: u64) -> Option<Located> {
    if stride == 0 {
        warn!("scan stride is zero, skipping scan");
        return None;
    }
    let last = file_size.checked_sub(SUPERBLOCK_SIZE as u64)?;

    let mut offset = 0u64;
    let mut probes = 0u64;
    while offset <= last {
        probes += 1;
        if offset != 0 {
            if let Some(superblock) = valid_at(file, offset, file_size) {
                debug!(offset, probes, "squashfs found by scan");
                return Some(Located {
                    offset,
                    method: LocateMethod::Scan,
                    superblock,
                });
            }
        }
        offset = match offset.checked_add(stride) {
            Some(next) => next,
            None => break,
        };
    }

    debug!(probes, file_size, stride, "scan found no squashfs superblock");
    None
}
