//! Thumbnail provider for AppImages.

use std::{io::Cursor, path::Path};

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, trace, warn};

use crate::{
    detect::is_appimage,
    error::Result,
    icon::{try_get_icon, IconBytes},
    settings::Settings,
    sniff::IconFormat,
};

/// Icon edges a thumbnail is snapped to.
const SUPPORTED_DIMENSIONS: &[u32] = &[16, 24, 32, 48, 64, 72, 80, 96, 128, 192, 256, 512];

/// Something that can turn a file into thumbnail bytes.
pub trait Thumbnailer {
    /// Cheap check on whether `path` is worth a [`Self::make_thumbnail`]
    /// call.
    fn can_provide(&self, path: &Path) -> bool;

    fn make_thumbnail(&mut self, path: &Path) -> Option<Vec<u8>>;

    /// Extension of the most recent thumbnail produced.
    fn file_name_extension(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Default)]
pub struct AppImageThumbnailer {
    settings: Settings,
    last_format: Option<IconFormat>,
}

impl AppImageThumbnailer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            last_format: None,
        }
    }

    /// Like [`Thumbnailer::make_thumbnail`] but keeps the failure reason.
    pub fn try_make_thumbnail(&mut self, path: &Path) -> Result<IconBytes> {
        self.last_format = None;
        let icon = try_get_icon(path, &self.settings)?;
        let icon = match icon.format {
            IconFormat::Png => downscale_png(icon, self.settings.thumbnail_size)?,
            _ => icon,
        };
        self.last_format = Some(icon.format);
        Ok(icon)
    }
}

impl Thumbnailer for AppImageThumbnailer {
    fn can_provide(&self, path: &Path) -> bool {
        is_appimage(path)
    }

    fn make_thumbnail(&mut self, path: &Path) -> Option<Vec<u8>> {
        match self.try_make_thumbnail(path) {
            Ok(icon) => Some(icon.data),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "no thumbnail");
                None
            }
        }
    }

    fn file_name_extension(&self) -> Option<&str> {
        self.last_format.map(IconFormat::extension)
    }
}

/// Largest supported edge not above `limit`, or `limit` itself when it is
/// below every supported edge.
fn target_edge(limit: u32) -> u32 {
    SUPPORTED_DIMENSIONS
        .iter()
        .rev()
        .find(|&&edge| edge <= limit)
        .copied()
        .unwrap_or(limit.max(1))
}

fn resize_to_fit(image: DynamicImage, limit: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= limit && height <= limit {
        return image;
    }
    let edge = target_edge(limit);
    trace!(width, height, edge, "downscaling icon");
    image.resize(edge, edge, FilterType::Lanczos3)
}

/// Re-encodes a PNG icon so neither edge exceeds `limit`. Icons that
/// already fit are returned untouched.
pub fn downscale_png(icon: IconBytes, limit: u32) -> Result<IconBytes> {
    match icon.dimensions() {
        Some((width, height)) if width <= limit && height <= limit => return Ok(icon),
        _ => {}
    }

    let image = image::load_from_memory_with_format(&icon.data, ImageFormat::Png)?;
    let resized = resize_to_fit(image, limit);

    let mut data = Vec::new();
    resized.write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
    debug!(
        before = icon.data.len(),
        after = data.len(),
        "thumbnail re-encoded"
    );
    Ok(IconBytes {
        data,
        format: IconFormat::Png,
    })
}
