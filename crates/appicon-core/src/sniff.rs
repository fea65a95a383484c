//! Recognizes the image formats an AppImage icon may use.

use serde::Serialize;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
const ICNS_MAGIC: &[u8; 4] = b"icns";
const TIFF_LE: &[u8; 4] = b"II*\0";
const TIFF_BE: &[u8; 4] = b"MM\0*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IconFormat {
    Png,
    Icns,
    Tiff,
}

impl IconFormat {
    pub fn extension(self) -> &'static str {
        match self {
            IconFormat::Png => "png",
            IconFormat::Icns => "icns",
            IconFormat::Tiff => "tiff",
        }
    }
}

impl std::fmt::Display for IconFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Identifies `data` by its leading bytes. PNG data must also carry a
/// well-formed IHDR with non-zero dimensions.
pub fn sniff(data: &[u8]) -> Option<IconFormat> {
    if data.starts_with(&PNG_SIGNATURE) {
        return png_dimensions(data).map(|_| IconFormat::Png);
    }
    if data.starts_with(ICNS_MAGIC) {
        return Some(IconFormat::Icns);
    }
    if data.starts_with(TIFF_LE) || data.starts_with(TIFF_BE) {
        return Some(IconFormat::Tiff);
    }
    None
}

/// Walks the PNG chunk stream to IHDR and returns `(width, height)`.
///
/// CRCs are not checked. A stream that ends before IHDR, an IHDR shorter
/// than 8 bytes, or a zero dimension yields `None`.
pub fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut rest = data.strip_prefix(&PNG_SIGNATURE[..])?;

    loop {
        let length = u32::from_be_bytes(rest.get(0..4)?.try_into().ok()?) as usize;
        let kind = rest.get(4..8)?;
        let payload = rest.get(8..8usize.checked_add(length)?)?;

        if kind == b"IHDR" {
            if length < 8 {
                return None;
            }
            let width = u32::from_be_bytes(payload[0..4].try_into().ok()?);
            let height = u32::from_be_bytes(payload[4..8].try_into().ok()?);
            return (width != 0 && height != 0).then_some((width, height));
        }

        // payload, then the 4-byte CRC
        rest = rest.get(12usize.checked_add(length)?..)?;
    }
}
