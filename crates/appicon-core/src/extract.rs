//! Pulling `.DirIcon` out of the embedded squashfs image.

use std::{
    collections::{HashMap, HashSet},
    io::Read,
    path::{Component, Path, PathBuf},
};

use backhand::{
    BackhandError, FilesystemReader, InnerNode, Node, SquashfsFileReader,
};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    backing::BackingStore,
    error::ErrorContext,
    superblock::{strip_optional_tables, Superblock, SUPERBLOCK_SIZE},
};

/// Root-relative name of the icon entry.
pub const DIR_ICON: &str = ".DirIcon";

/// Marks a file with no fragment.
const NO_FRAGMENT: u32 = u32::MAX;

#[derive(Error, Diagnostic, Debug)]
pub enum ExtractError {
    #[error("Failed to open squashfs image: {0}")]
    #[diagnostic(code(appicon::extract::open))]
    Open(#[source] BackhandError),

    #[error("`{}` not found in image", .0.display())]
    #[diagnostic(code(appicon::extract::not_found))]
    NotFound(PathBuf),

    #[error("`{}` is fragment-backed but the fragment table is unavailable", .0.display())]
    #[diagnostic(code(appicon::extract::fragments))]
    FragmentsUnavailable(PathBuf),

    #[error("`{}` declares {size} bytes, limit is {limit}", path.display())]
    #[diagnostic(
        code(appicon::extract::too_large),
        help("Raise max_icon_size in the configuration")
    )]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("`{}` is empty", .0.display())]
    #[diagnostic(code(appicon::extract::empty))]
    Empty(PathBuf),

    #[error("Short read on `{}`: expected {expected} bytes, got {actual}", path.display())]
    #[diagnostic(code(appicon::extract::short_read))]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to read `{}`", path.display())]
    #[diagnostic(code(appicon::extract::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Symlink chain longer than {limit} links")]
    #[diagnostic(code(appicon::extract::symlink_depth))]
    SymlinkDepth { limit: usize },

    #[error("Symlink cycle through `{}`", .0.display())]
    #[diagnostic(code(appicon::extract::symlink_cycle))]
    SymlinkCycle(PathBuf),

    #[error("`{}` is a {kind}, not a file", path.display())]
    #[diagnostic(code(appicon::extract::no_data))]
    NoData { path: PathBuf, kind: &'static str },
}

/// Bounds applied while reading the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    pub max_symlink_depth: usize,
    pub max_icon_size: u64,
}

/// An open image plus the state the lookup needs. Borrows the store, so it
/// is always dropped before the store is.
pub struct ExtractionContext<'a> {
    fs: FilesystemReader<'a>,
    fragments_ready: bool,
    limits: ExtractLimits,
}

impl<'a> ExtractionContext<'a> {
    /// Opens the image. When the first open fails on an image that declares
    /// a fragment table or compressor options, it is retried once through a
    /// superblock that declares neither. Files stored whole still read; a
    /// fragment-backed file then fails with
    /// [`ExtractError::FragmentsUnavailable`].
    pub fn open(
        store: &'a BackingStore,
        superblock: &Superblock,
        limits: ExtractLimits,
    ) -> crate::error::Result<Self> {
        let (fs, stripped) = match FilesystemReader::from_reader(store.reader()?) {
            Ok(fs) => (fs, false),
            Err(err)
                if superblock.declares_fragments() || superblock.has_compressor_options() =>
            {
                warn!(error = %err, "open failed, retrying without optional tables");
                let fs = Self::open_stripped(store).map_err(|retry| {
                    debug!(error = %retry, "stripped open failed too");
                    ExtractError::Open(err)
                })?;
                (fs, true)
            }
            Err(err) => return Err(ExtractError::Open(err).into()),
        };

        if superblock.has_compressor_options() && fs.compression_options.is_none() {
            warn!(
                compression = superblock.compression_name(),
                "compressor options declared but not read, using defaults"
            );
        }

        let fragments_ready =
            !superblock.declares_fragments() || (!stripped && fs.fragments.is_some());
        if !fragments_ready {
            warn!(
                fragment_count = superblock.fragment_count,
                "fragment table did not load"
            );
        }

        debug!(
            backing = ?store.kind(),
            compression = superblock.compression_name(),
            inode_count = superblock.inode_count,
            fragments_ready,
            "opened squashfs image"
        );

        Ok(Self {
            fs,
            fragments_ready,
            limits,
        })
    }

    fn open_stripped(store: &'a BackingStore) -> crate::error::Result<FilesystemReader<'a>> {
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        store
            .reader()?
            .read_exact(&mut raw)
            .with_context(|| "re-reading the squashfs superblock".to_string())?;
        strip_optional_tables(&mut raw);

        let reader = store.reader_with_head(raw.to_vec())?;
        Ok(FilesystemReader::from_reader(reader).map_err(ExtractError::Open)?)
    }

    pub fn fragments_ready(&self) -> bool {
        self.fragments_ready
    }

    /// Reads `/.DirIcon`, following symlinks.
    pub fn dir_icon(&self) -> Result<Vec<u8>, ExtractError> {
        self.read_path(Path::new(DIR_ICON))
    }

    /// Reads the file at root-relative `path`, following symlinks up to the
    /// configured depth.
    pub fn read_path(&self, path: &Path) -> Result<Vec<u8>, ExtractError> {
        let index: HashMap<&Path, &Node<SquashfsFileReader>> = self
            .fs
            .files()
            .map(|node| (node.fullpath.as_path(), node))
            .collect();

        let mut current = root_relative(path);
        let mut visited = HashSet::new();
        let mut hops = 0usize;

        loop {
            if !visited.insert(current.clone()) {
                return Err(ExtractError::SymlinkCycle(current));
            }

            let node = index
                .get(current.as_path())
                .ok_or_else(|| ExtractError::NotFound(current.clone()))?;

            match &node.inner {
                InnerNode::File(file) => return self.read_file(&current, file),
                InnerNode::Symlink(symlink) => {
                    hops += 1;
                    if hops > self.limits.max_symlink_depth {
                        return Err(ExtractError::SymlinkDepth {
                            limit: self.limits.max_symlink_depth,
                        });
                    }
                    let target = root_relative(&symlink.link);
                    trace!(
                        from = %current.display(),
                        to = %target.display(),
                        hops,
                        "following symlink"
                    );
                    current = target;
                }
                InnerNode::Dir(_) => return Err(no_data(current, "directory")),
                _ => return Err(no_data(current, "special file")),
            }
        }
    }

    fn read_file(&self, path: &Path, file: &SquashfsFileReader) -> Result<Vec<u8>, ExtractError> {
        let (size, frag_index) = match file {
            SquashfsFileReader::Basic(basic) => (u64::from(basic.file_size), basic.frag_index),
            SquashfsFileReader::Extended(extended) => (extended.file_size, extended.frag_index),
        };

        if frag_index != NO_FRAGMENT && !self.fragments_ready {
            return Err(ExtractError::FragmentsUnavailable(path.to_path_buf()));
        }
        if size == 0 {
            return Err(ExtractError::Empty(path.to_path_buf()));
        }
        let limit = self.limits.max_icon_size.min(u64::from(u32::MAX));
        if size > limit {
            return Err(ExtractError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit,
            });
        }

        let mut data = Vec::with_capacity(size as usize);
        self.fs
            .file(file)
            .reader()
            .take(size)
            .read_to_end(&mut data)
            .map_err(|source| {
                ExtractError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        if data.len() as u64 != size {
            return Err(ExtractError::ShortRead {
                path: path.to_path_buf(),
                expected: size,
                actual: data.len() as u64,
            });
        }

        debug!(path = %path.display(), size, "read icon data");
        Ok(data)
    }
}

fn no_data(path: PathBuf, kind: &'static str) -> ExtractError {
    ExtractError::NoData { path, kind }
}

/// Turns a link target or lookup path into the absolute form the image's
/// node table uses. One leading separator is dropped, `.` is skipped and
/// `..` never climbs above the root.
pub fn root_relative(path: &Path) -> PathBuf {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                parts.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }

    let mut resolved = PathBuf::from("/");
    resolved.extend(parts);
    resolved
}

/// Opens the image in `store` and reads its `.DirIcon`.
pub fn extract_dir_icon(
    store: &BackingStore,
    superblock: &Superblock,
    limits: ExtractLimits,
) -> crate::error::Result<Vec<u8>> {
    let context = ExtractionContext::open(store, superblock, limits)?;
    Ok(context.dir_icon()?)
}
