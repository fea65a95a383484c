use appicon_utils::error::{BytesError, FileSystemError, PathError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(appicon_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(appicon_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(appicon_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Configuration file already exists at {0}")]
    #[diagnostic(
        code(appicon_config::already_exists),
        help("Remove the existing config file or pass a different path with --config")
    )]
    ConfigAlreadyExists(String),

    #[error("Invalid value for `{field}`: {reason}")]
    #[diagnostic(
        code(appicon_config::invalid_value),
        help("Fix the value in config.toml or remove it to use the default")
    )]
    InvalidValue { field: &'static str, reason: String },

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(appicon_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(appicon_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Utils(#[from] UtilsError),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<BytesError> for ConfigError {
    fn from(err: BytesError) -> Self {
        Self::Utils(UtilsError::Bytes(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
