//! Error types for the icon extraction pipeline.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::{elf::ElfError, extract::ExtractError};

/// Terminal outcome of a failed icon fetch.
///
/// Each variant is one "no icon" state of the pipeline. Callers of
/// [`crate::get_icon`] never see these; [`crate::try_get_icon`] hands them
/// out for diagnostics.
#[derive(Error, Diagnostic, Debug)]
pub enum IconError {
    #[error("`{}` is not a type-2 AppImage", path.display())]
    #[diagnostic(
        code(appicon::not_an_appimage),
        help("Only ELF files carrying the AI\\x02 marker are supported")
    )]
    NotAnAppImage { path: PathBuf },

    #[error("No squashfs image found in `{}`", path.display())]
    #[diagnostic(
        code(appicon::offset_not_found),
        help("Try a smaller scan_stride if the payload is not page aligned")
    )]
    OffsetNotFound { path: PathBuf },

    #[error("Error while {action}")]
    #[diagnostic(code(appicon::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    MalformedElf(#[from] ElfError),

    #[error("Invalid squashfs superblock at offset {offset}")]
    #[diagnostic(code(appicon::invalid_superblock))]
    InvalidSuperblock { offset: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractError),

    #[error("Extracted icon is not a supported image")]
    #[diagnostic(
        code(appicon::unsupported_image),
        help("Only PNG, ICNS and TIFF icons are recognized")
    )]
    UnsupportedImage,

    #[error(transparent)]
    #[diagnostic(code(appicon::thumbnail))]
    Thumbnail(#[from] image::ImageError),
}

/// A specialized Result type for icon extraction.
pub type Result<T> = std::result::Result<T, IconError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Wraps the error with a description of the action being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|source| {
            IconError::IoError {
                action: context(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_with_context_wraps_io_errors() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = result
            .with_context(|| "opening /tmp/app.AppImage".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while opening /tmp/app.AppImage");
        assert!(matches!(err, IconError::IoError { .. }));
    }

    #[test]
    fn test_display() {
        let err = IconError::NotAnAppImage {
            path: PathBuf::from("/bin/ls"),
        };
        assert_eq!(err.to_string(), "`/bin/ls` is not a type-2 AppImage");

        let err = IconError::InvalidSuperblock { offset: 4096 };
        assert_eq!(
            err.to_string(),
            "Invalid squashfs superblock at offset 4096"
        );
    }
}
