//! The extraction pipeline: detect, locate, extract, sniff.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    backing::{BackingKind, BackingStore},
    detect::{is_appimage_header, IDENT_LEN},
    elf::{read_geometry, ElfGeometry},
    error::{ErrorContext, IconError, Result},
    extract::{extract_dir_icon, ExtractLimits},
    locate::{locate_squashfs, Located},
    settings::Settings,
    sniff::{png_dimensions, sniff, IconFormat},
};

/// Icon data that passed sniffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconBytes {
    pub data: Vec<u8>,
    pub format: IconFormat,
}

impl IconBytes {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Pixel size, for PNG icons only.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.format {
            IconFormat::Png => png_dimensions(&self.data),
            _ => None,
        }
    }
}

/// Opens `path` and checks its identification bytes. A file that cannot be
/// opened or read is not an AppImage, same as one with the wrong magic.
fn open_checked(path: &Path) -> Result<(File, u64)> {
    let not_an_appimage = || {
        IconError::NotAnAppImage {
            path: path.to_path_buf(),
        }
    };

    let mut file = File::open(path).map_err(|err| {
        debug!(path = %path.display(), error = %err, "cannot open");
        not_an_appimage()
    })?;

    let mut header = [0u8; IDENT_LEN];
    let is_appimage = match file.read_exact(&mut header) {
        Ok(()) => is_appimage_header(&header),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "cannot read identification bytes");
            false
        }
    };
    if !is_appimage {
        return Err(not_an_appimage());
    }

    let file_size = file
        .metadata()
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();
    Ok((file, file_size))
}

fn locate(path: &Path, file: &File, file_size: u64, settings: &Settings) -> Result<Located> {
    locate_squashfs(file, file_size, settings.scan_stride).ok_or_else(|| {
        IconError::OffsetNotFound {
            path: path.to_path_buf(),
        }
    })
}

/// Runs the whole pipeline and reports why it stopped when it fails.
pub fn try_get_icon<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<IconBytes> {
    let path = path.as_ref();

    let (file, file_size) = open_checked(path)?;
    let located = locate(path, &file, file_size, settings)?;
    debug!(
        path = %path.display(),
        offset = located.offset,
        method = ?located.method,
        file_size,
        "located squashfs image"
    );

    let store = BackingStore::create(
        &file,
        located.offset,
        file_size - located.offset,
        settings.backing,
        settings.copy_chunk_size,
        settings.temp_dir.as_deref(),
    )?;

    let limits = ExtractLimits {
        max_symlink_depth: settings.max_symlink_depth,
        max_icon_size: settings.max_icon_size,
    };
    let data = extract_dir_icon(&store, &located.superblock, limits)?;
    drop(store);

    let format = sniff(&data).ok_or(IconError::UnsupportedImage)?;
    debug!(path = %path.display(), size = data.len(), %format, "icon extracted");
    Ok(IconBytes { data, format })
}

/// Icon bytes for `path`, or `None` when it has no usable icon.
///
/// Never fails: every error is logged and swallowed.
pub fn get_icon<P: AsRef<Path>>(path: P, settings: &Settings) -> Option<IconBytes> {
    let path = path.as_ref();
    match try_get_icon(path, settings) {
        Ok(icon) => Some(icon),
        Err(IconError::NotAnAppImage { .. }) => {
            debug!(path = %path.display(), "not a type-2 AppImage");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "no icon");
            None
        }
    }
}

/// Everything the pipeline learned about a file, for display.
#[derive(Debug, Serialize)]
pub struct Inspection {
    pub path: PathBuf,
    pub file_size: u64,
    pub is_appimage: bool,
    pub elf: Option<ElfGeometry>,
    pub elf_error: Option<String>,
    pub located: Option<Located>,
    pub backing: Option<BackingKind>,
    pub icon_format: Option<IconFormat>,
    pub icon_size: Option<usize>,
    pub icon_dimensions: Option<(u32, u32)>,
    pub icon_error: Option<String>,
}

/// Runs every stage it can and records each outcome instead of stopping at
/// the first failure.
pub fn inspect<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<Inspection> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let file_size = file
        .metadata()
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();

    let mut header = [0u8; IDENT_LEN];
    let is_appimage = file.read_exact(&mut header).is_ok() && is_appimage_header(&header);

    let (elf, elf_error) = match read_geometry(&file, file_size) {
        Ok(geometry) => (Some(geometry), None),
        Err(err) => (None, Some(err.to_string())),
    };

    let mut inspection = Inspection {
        path: path.to_path_buf(),
        file_size,
        is_appimage,
        elf,
        elf_error,
        located: None,
        backing: None,
        icon_format: None,
        icon_size: None,
        icon_dimensions: None,
        icon_error: None,
    };

    if !is_appimage {
        return Ok(inspection);
    }

    let Some(located) = locate_squashfs(&file, file_size, settings.scan_stride) else {
        inspection.icon_error = Some(
            IconError::OffsetNotFound {
                path: path.to_path_buf(),
            }
            .to_string(),
        );
        return Ok(inspection);
    };
    inspection.located = Some(located);

    let store = BackingStore::create(
        &file,
        located.offset,
        file_size - located.offset,
        settings.backing,
        settings.copy_chunk_size,
        settings.temp_dir.as_deref(),
    )?;
    inspection.backing = Some(store.kind());

    let limits = ExtractLimits {
        max_symlink_depth: settings.max_symlink_depth,
        max_icon_size: settings.max_icon_size,
    };
    match extract_dir_icon(&store, &located.superblock, limits) {
        Ok(data) => {
            inspection.icon_size = Some(data.len());
            match sniff(&data) {
                Some(format) => {
                    inspection.icon_format = Some(format);
                    inspection.icon_dimensions = png_dimensions(&data);
                }
                None => inspection.icon_error = Some(IconError::UnsupportedImage.to_string()),
            }
        }
        Err(err) => inspection.icon_error = Some(err.to_string()),
    }

    info!(path = %path.display(), offset = located.offset, "inspected");
    Ok(inspection)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_plain_file_is_not_an_appimage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"just some text, long enough to read sixteen bytes").unwrap();

        let err = try_get_icon(&path, &Settings::default()).unwrap_err();
        assert!(matches!(err, IconError::NotAnAppImage { .. }));
        assert!(get_icon(&path, &Settings::default()).is_none());
    }

    #[test]
    fn test_unopenable_file_is_not_an_appimage() {
        let dir = tempdir().unwrap();
        let err = try_get_icon(dir.path().join("gone"), &Settings::default()).unwrap_err();
        assert!(matches!(err, IconError::NotAnAppImage { .. }));

        let err = try_get_icon(dir.path(), &Settings::default()).unwrap_err();
        assert!(matches!(err, IconError::NotAnAppImage { .. }));
    }

    #[test]
    fn test_short_file_is_not_an_appimage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short");
        fs::write(&path, b"\x7fELF").unwrap();
        let err = try_get_icon(&path, &Settings::default()).unwrap_err();
        assert!(matches!(err, IconError::NotAnAppImage { .. }));
    }

    #[test]
    fn test_inspect_non_appimage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob");
        fs::write(&path, [0u8; 64]).unwrap();

        let report = inspect(&path, &Settings::default()).unwrap();
        assert!(!report.is_appimage);
        assert!(report.elf.is_none());
        assert!(report.elf_error.is_some());
        assert!(report.located.is_none());
    }
}
