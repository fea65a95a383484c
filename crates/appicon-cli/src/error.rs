use std::path::PathBuf;

use appicon_config::error::ConfigError;
use appicon_core::IconError;
use appicon_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Icon(#[from] IconError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error("Failed to serialize output")]
    #[diagnostic(code(appicon::cli::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize configuration")]
    #[diagnostic(code(appicon::cli::toml))]
    Toml(#[from] toml::ser::Error),

    #[error("Failed to start worker pool")]
    #[diagnostic(code(appicon::cli::threads))]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Cannot derive an output name from `{}`", .0.display())]
    #[diagnostic(code(appicon::cli::output), help("Pass --output explicitly"))]
    NoOutputName(PathBuf),
}

pub type Result<T> = std::result::Result<T, CliError>;
