use std::path::PathBuf;

use appicon_config::config::{
    BackingStrategy, Config, DEFAULT_MAX_SYMLINK_DEPTH, DEFAULT_SCAN_STRIDE,
    DEFAULT_THUMBNAIL_SIZE,
};

/// Resolved knobs for one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub scan_stride: u64,
    pub copy_chunk_size: usize,
    pub max_symlink_depth: usize,
    pub max_icon_size: u64,
    pub backing: BackingStrategy,
    pub temp_dir: Option<PathBuf>,
    pub thumbnail_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_stride: DEFAULT_SCAN_STRIDE,
            copy_chunk_size: 8 * 1024,
            max_symlink_depth: DEFAULT_MAX_SYMLINK_DEPTH,
            max_icon_size: 16 * 1024 * 1024,
            backing: BackingStrategy::Auto,
            temp_dir: None,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl Settings {
    pub fn from_config(config: &Config) -> appicon_config::error::Result<Self> {
        Ok(Self {
            scan_stride: config.get_scan_stride(),
            copy_chunk_size: config.get_copy_chunk_size()?,
            max_symlink_depth: config.get_max_symlink_depth(),
            max_icon_size: config.get_max_icon_size()?,
            backing: config.get_backing(),
            temp_dir: config.get_temp_dir()?,
            thumbnail_size: config.get_thumbnail_size(),
        })
    }

    /// Settings from the global configuration.
    pub fn current() -> appicon_config::error::Result<Self> {
        Self::from_config(&appicon_config::config::get_config())
    }
}
