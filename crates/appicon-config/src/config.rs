use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
};

use appicon_utils::{
    bytes::parse_bytes,
    fs::ensure_dir_exists,
    path::{resolve_path, xdg_config_home},
};
use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::{annotate_document, render_annotated},
    error::{ConfigError, Result},
};

pub const DEFAULT_SCAN_STRIDE: u64 = 4096;
pub const DEFAULT_COPY_CHUNK_SIZE: &str = "8KiB";
pub const DEFAULT_MAX_SYMLINK_DEPTH: usize = 8;
pub const DEFAULT_MAX_ICON_SIZE: &str = "16MiB";
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// How the embedded image is presented to the squashfs reader.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackingStrategy {
    /// Copy to a temporary file, falling back to a window over the original
    /// descriptor when the copy cannot be made.
    #[default]
    Auto,
    /// Always copy to a temporary file.
    TempFile,
    /// Always read through a window over the original descriptor.
    Window,
}

/// appicon configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Stride, in bytes, of the fallback superblock scan.
    /// Packaging tools usually align the embedded image to a 4 KiB page.
    /// Default: 4096
    pub scan_stride: Option<u64>,

    /// Chunk size used when copying the embedded image to a temporary file.
    /// Default: "8KiB"
    pub copy_chunk_size: Option<String>,

    /// Maximum number of symlinks followed when resolving .DirIcon.
    /// Default: 8
    pub max_symlink_depth: Option<usize>,

    /// Largest icon accepted from an image, e.g. "16MiB".
    /// Default: "16MiB"
    pub max_icon_size: Option<String>,

    /// Backing strategy: "auto", "temp-file" or "window".
    /// Default: "auto"
    pub backing: Option<BackingStrategy>,

    /// Directory for temporary copies of embedded images.
    /// Default: the system temporary directory
    pub temp_dir: Option<String>,

    /// Largest edge, in pixels, of generated thumbnails.
    /// Default: 128
    pub thumbnail_size: Option<u32>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("APPICON_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_config_home().join("appicon").join("config.toml"),
    })
});

/// Points the loader at a different config file. Takes effect on the next
/// [`init`].
pub fn set_config_path<P: AsRef<Path>>(path: P) {
    let mut config_path = CONFIG_PATH.write().unwrap_or_else(|err| err.into_inner());
    *config_path = path.as_ref().to_path_buf();
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(|err| err.into_inner())
        .clone()
}

/// Loads the configuration file into the global slot.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global = CONFIG.write().unwrap_or_else(|err| err.into_inner());
    *global = Some(config);
    Ok(())
}

/// Returns the loaded configuration, or the defaults if [`init`] was never
/// called.
pub fn get_config() -> Config {
    CONFIG
        .read()
        .unwrap_or_else(|err| err.into_inner())
        .clone()
        .unwrap_or_else(Config::default_config)
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            scan_stride: Some(DEFAULT_SCAN_STRIDE),
            copy_chunk_size: Some(DEFAULT_COPY_CHUNK_SIZE.to_string()),
            max_symlink_depth: Some(DEFAULT_MAX_SYMLINK_DEPTH),
            max_icon_size: Some(DEFAULT_MAX_ICON_SIZE.to_string()),
            backing: Some(BackingStrategy::Auto),
            temp_dir: None,
            thumbnail_size: Some(DEFAULT_THUMBNAIL_SIZE),
        }
    }

    /// Reads the configuration file, falling back to defaults when it does
    /// not exist. `APPICON_STEALTH` skips the file entirely.
    pub fn new() -> Result<Self> {
        if std::env::var("APPICON_STEALTH").is_ok() {
            return Ok(Self::default_config());
        }

        let path = config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loading configuration");
                toml::from_str(&content)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;
        Ok(config)
    }

    /// Fills unset fields with defaults and rejects values the pipeline
    /// cannot work with.
    pub fn resolve(&mut self) -> Result<()> {
        let stride = *self.scan_stride.get_or_insert(DEFAULT_SCAN_STRIDE);
        if stride == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scan_stride",
                reason: "must be greater than zero".into(),
            });
        }

        let depth = *self
            .max_symlink_depth
            .get_or_insert(DEFAULT_MAX_SYMLINK_DEPTH);
        if depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_symlink_depth",
                reason: "must be at least 1".into(),
            });
        }

        self.copy_chunk_size
            .get_or_insert_with(|| DEFAULT_COPY_CHUNK_SIZE.to_string());
        self.max_icon_size
            .get_or_insert_with(|| DEFAULT_MAX_ICON_SIZE.to_string());
        self.backing.get_or_insert_with(BackingStrategy::default);
        self.thumbnail_size.get_or_insert(DEFAULT_THUMBNAIL_SIZE);

        if self.get_copy_chunk_size()? == 0 {
            return Err(ConfigError::InvalidValue {
                field: "copy_chunk_size",
                reason: "must be greater than zero".into(),
            });
        }
        self.get_max_icon_size()?;

        Ok(())
    }

    pub fn get_scan_stride(&self) -> u64 {
        self.scan_stride.unwrap_or(DEFAULT_SCAN_STRIDE)
    }

    pub fn get_copy_chunk_size(&self) -> Result<usize> {
        let raw = self
            .copy_chunk_size
            .as_deref()
            .unwrap_or(DEFAULT_COPY_CHUNK_SIZE);
        let size = parse_bytes(raw)?;
        usize::try_from(size).map_err(|_| {
            ConfigError::InvalidValue {
                field: "copy_chunk_size",
                reason: format!("{size} does not fit in memory"),
            }
        })
    }

    pub fn get_max_symlink_depth(&self) -> usize {
        self.max_symlink_depth.unwrap_or(DEFAULT_MAX_SYMLINK_DEPTH)
    }

    pub fn get_max_icon_size(&self) -> Result<u64> {
        let raw = self
            .max_icon_size
            .as_deref()
            .unwrap_or(DEFAULT_MAX_ICON_SIZE);
        Ok(parse_bytes(raw)?)
    }

    pub fn get_backing(&self) -> BackingStrategy {
        self.backing.unwrap_or_default()
    }

    /// Directory for temporary copies. `APPICON_TMPDIR` overrides the
    /// configured value; `None` means the system default.
    pub fn get_temp_dir(&self) -> Result<Option<PathBuf>> {
        if let Ok(env_path) = std::env::var("APPICON_TMPDIR") {
            return Ok(Some(resolve_path(&env_path)?));
        }
        match &self.temp_dir {
            Some(dir) => Ok(Some(resolve_path(dir)?)),
            None => Ok(None),
        }
    }

    pub fn get_thumbnail_size(&self) -> u32 {
        self.thumbnail_size.unwrap_or(DEFAULT_THUMBNAIL_SIZE)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let mut doc = toml::to_string_pretty(self)?.parse::<DocumentMut>()?;
        annotate_document::<Config>(&mut doc)?;
        Ok(doc)
    }
}

/// Writes an annotated default configuration to the config path.
///
/// # Errors
///
/// [`ConfigError::ConfigAlreadyExists`] if a file is already there.
pub fn generate_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(
            path.display().to_string(),
        ));
    }

    let doc = Config::default_config().to_annotated_document()?;
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    fs::write(&path, render_annotated::<Config>(&doc))?;
    info!("Default configuration written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.get_scan_stride(), 4096);
        assert_eq!(config.get_copy_chunk_size().unwrap(), 8192);
        assert_eq!(config.get_max_symlink_depth(), 8);
        assert_eq!(config.get_max_icon_size().unwrap(), 16 * 1024 * 1024);
        assert_eq!(config.get_backing(), BackingStrategy::Auto);
        assert_eq!(config.get_thumbnail_size(), 128);
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let mut config: Config = toml::from_str("scan_stride = 512").unwrap();
        config.resolve().unwrap();
        assert_eq!(config.scan_stride, Some(512));
        assert_eq!(config.max_symlink_depth, Some(8));
        assert_eq!(config.backing, Some(BackingStrategy::Auto));
        assert_eq!(config.copy_chunk_size.as_deref(), Some("8KiB"));
    }

    #[test]
    fn test_resolve_rejects_zero_stride() {
        let mut config: Config = toml::from_str("scan_stride = 0").unwrap();
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue {
                field: "scan_stride",
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_rejects_zero_depth() {
        let mut config: Config = toml::from_str("max_symlink_depth = 0").unwrap();
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidValue {
                field: "max_symlink_depth",
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_size() {
        let mut config: Config = toml::from_str("max_icon_size = \"lots\"").unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::Utils(_))));
    }

    #[test]
    fn test_backing_strategy_names() {
        let config: Config = toml::from_str("backing = \"temp-file\"").unwrap();
        assert_eq!(config.get_backing(), BackingStrategy::TempFile);
        let config: Config = toml::from_str("backing = \"window\"").unwrap();
        assert_eq!(config.get_backing(), BackingStrategy::Window);
        assert!(toml::from_str::<Config>("backing = \"mmap\"").is_err());
    }

    #[test]
    #[serial]
    fn test_temp_dir_env_override() {
        with_env(vec![("APPICON_TMPDIR", "/var/tmp/appicon")], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_temp_dir().unwrap(),
                Some(PathBuf::from("/var/tmp/appicon"))
            );
        });
    }

    #[test]
    #[serial]
    fn test_load_and_generate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        set_config_path(&path);

        with_env(vec![], || {
            let loaded = Config::new().unwrap();
            assert_eq!(loaded.get_scan_stride(), DEFAULT_SCAN_STRIDE);

            let written = generate_default_config().unwrap();
            assert_eq!(written, path);
            assert!(matches!(
                generate_default_config(),
                Err(ConfigError::ConfigAlreadyExists(_))
            ));

            fs::write(&path, "scan_stride = 1024\nbacking = \"window\"\n").unwrap();
            init().unwrap();
            let config = get_config();
            assert_eq!(config.get_scan_stride(), 1024);
            assert_eq!(config.get_backing(), BackingStrategy::Window);
        });
    }
}
