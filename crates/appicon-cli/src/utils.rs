use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
};

use appicon_core::IconBytes;
use appicon_utils::fs::write_atomic;
use nu_ansi_term::Color;
use tracing::info;

use crate::error::{CliError, Result};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn color_enabled() -> bool {
    COLOR.read().map(|color| *color).unwrap_or(true)
}

pub fn disable_color() {
    if let Ok(mut color) = COLOR.write() {
        *color = false;
    }
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !color_enabled() {
            return self.1.fmt(f);
        }
        write!(f, "{}", self.0.prefix())?;
        self.1.fmt(f)?;
        write!(f, "{}", self.0.suffix())
    }
}

/// `<stem>.<ext>` for `source`, placed in `dir`. With a `suffix` the name
/// becomes `<stem>-<suffix>.<ext>`.
///
/// `Firefox-x86_64.AppImage` becomes `Firefox-x86_64.png`.
pub fn icon_file_name(
    source: &Path,
    suffix: Option<&str>,
    extension: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| CliError::NoOutputName(source.to_path_buf()))?;
    let mut name = stem.to_os_string();
    if let Some(suffix) = suffix {
        name.push("-");
        name.push(suffix);
    }
    name.push(".");
    name.push(extension);
    Ok(dir.join(name))
}

/// Writes `icon` to `output`, or next to the working directory under a name
/// derived from `source`.
pub fn write_icon(source: &Path, icon: &IconBytes, output: Option<&Path>) -> Result<PathBuf> {
    let target = match output {
        Some(path) => path.to_path_buf(),
        None => icon_file_name(source, None, icon.extension(), Path::new("."))?,
    };
    write_atomic(&target, &icon.data)?;
    info!("{} {}", Colored(Color::Green, "Saved"), target.display());
    Ok(target)
}
