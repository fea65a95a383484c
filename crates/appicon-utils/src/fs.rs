use std::{
    fs::{self, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::{FileSystemError, FileSystemResult};

/// Creates `path` and its parents if missing.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if something other than a directory
///   already sits at `path`.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    fs::create_dir_all(path).map_err(|source| {
        FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source,
        }
    })
}

/// Mode given to files that did not exist before.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Writes `contents` to `path` through a sibling temporary file.
///
/// Readers of `path` observe either the old content or the complete new
/// content, never a partial write. A replaced file keeps its mode; a new one
/// gets [`DEFAULT_FILE_MODE`].
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_err = |action: &'static str| {
        move |source: std::io::Error| {
            FileSystemError::File {
                path: path.to_path_buf(),
                action,
                source,
            }
        }
    };

    let permissions = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.permissions(),
        _ => Permissions::from_mode(DEFAULT_FILE_MODE),
    };

    let mut staged = NamedTempFile::new_in(&parent).map_err(file_err("stage"))?;
    staged.write_all(contents).map_err(file_err("write"))?;
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(file_err("chmod"))?;
    staged.as_file().sync_all().map_err(file_err("sync"))?;
    staged
        .persist(path)
        .map_err(|err| file_err("persist")(err.error))?;
    Ok(())
}
