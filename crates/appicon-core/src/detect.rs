//! Type-2 AppImage detection.

use std::{fs::File, io::Read, path::Path};

use tracing::trace;

/// Magic bytes for ELF executables.
pub const ELF_MAGIC_BYTES: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];

/// Type-2 AppImage marker, stored at offset 8 in the ELF identification
/// padding.
pub const APPIMAGE_TYPE2_MARKER: [u8; 3] = [0x41, 0x49, 0x02];

/// Number of leading bytes that decide detection.
pub const IDENT_LEN: usize = 16;

/// Returns true if `header` starts with the ELF magic and carries the
/// type-2 AppImage marker. Bytes outside `[0..4)` and `[8..11)` are ignored.
pub fn is_appimage_header(header: &[u8]) -> bool {
    header.len() >= IDENT_LEN
        && header[..4] == ELF_MAGIC_BYTES
        && header[8..11] == APPIMAGE_TYPE2_MARKER
}

/// Checks the first 16 bytes of the file at `path`.
///
/// Open failures and short reads count as "not an AppImage". At most
/// [`IDENT_LEN`] bytes are read.
pub fn is_appimage<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    let mut header = [0u8; IDENT_LEN];
    let result = File::open(path).and_then(|mut file| file.read_exact(&mut header));
    match result {
        Ok(()) => is_appimage_header(&header),
        Err(err) => {
            trace!(path = %path.display(), error = %err, "could not read identification bytes");
            false
        }
    }
}
