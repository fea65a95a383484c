//! Presents the embedded image as a standalone random-access source.
//!
//! The store is chosen once, when it is created, and is released through
//! `Drop` whichever way the extraction ends. A temporary copy is unlinked
//! and a window's duplicated descriptor is closed.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
    os::unix::fs::FileExt,
    path::Path,
};

use appicon_config::config::BackingStrategy;
use serde::Serialize;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::{ErrorContext, Result};

/// Extra zeroed bytes a window reports past its physical end, one metadata
/// block, so readers that probe past the payload for alignment see zeros.
pub const METADATA_PAD: u64 = 8192;

/// What the squashfs reader needs from its source.
pub trait RandomAccess: BufRead + Seek + Send {}

impl<T: BufRead + Seek + Send> RandomAccess for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackingKind {
    TempFile,
    Window,
}

/// A read-only window over `[base, base + physical_len)` of a duplicated
/// descriptor.
#[derive(Debug)]
pub struct Window {
    file: File,
    base: u64,
    physical_len: u64,
    virtual_size: u64,
}

impl Window {
    pub fn new(file: &File, base: u64, physical_len: u64) -> io::Result<Self> {
        Ok(Self {
            file: file.try_clone()?,
            base,
            physical_len,
            virtual_size: physical_len.saturating_add(METADATA_PAD),
        })
    }

    pub fn physical_len(&self) -> u64 {
        self.physical_len
    }

    pub fn virtual_size(&self) -> u64 {
        self.virtual_size
    }

    /// Fills `buf` from virtual offset `pos`. Bytes past the physical end
    /// read as zero; only the virtual end yields a short read.
    pub fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        if pos >= self.virtual_size || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min((self.virtual_size - pos) as usize);
        let buf = &mut buf[..want];

        if pos < self.physical_len {
            let physical = want.min((self.physical_len - pos) as usize);
            let n = self.file.read_at(&mut buf[..physical], self.base + pos)?;
            if n > 0 {
                return Ok(n);
            }
            // The host file shrank under us; treat the rest as padding.
            buf[..physical].fill(0);
            return Ok(physical);
        }

        buf.fill(0);
        Ok(want)
    }
}

/// Cursor over a [`Window`]. It implements only `Read` and `Seek`, so the
/// region cannot be written or truncated through it.
#[derive(Debug)]
pub struct WindowReader<'a> {
    window: &'a Window,
    pos: u64,
}

impl Read for WindowReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.window.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for WindowReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.window.virtual_size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => {
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid seek to a negative or overflowing position",
                ))
            }
        }
    }
}

/// The embedded image, owned by exactly one extraction call.
#[derive(Debug)]
pub enum BackingStore {
    TempFile { file: NamedTempFile, len: u64 },
    Window(Window),
}

impl BackingStore {
    /// Builds a store over `[offset, offset + len)` of `file`.
    ///
    /// With [`BackingStrategy::Auto`] a failed copy falls back to a window.
    pub fn create(
        file: &File,
        offset: u64,
        len: u64,
        strategy: BackingStrategy,
        chunk_size: usize,
        temp_dir: Option<&Path>,
    ) -> Result<Self> {
        match strategy {
            BackingStrategy::TempFile => {
                copy_region(file, offset, len, chunk_size, temp_dir)
                    .with_context(|| format!("copying {len} bytes at offset {offset} to a temporary file"))
            }
            BackingStrategy::Window => Self::window(file, offset, len),
            BackingStrategy::Auto => {
                match copy_region(file, offset, len, chunk_size, temp_dir) {
                    Ok(store) => Ok(store),
                    Err(err) => {
                        warn!(offset, len, error = %err, "temporary copy failed, using a window");
                        Self::window(file, offset, len)
                    }
                }
            }
        }
    }

    fn window(file: &File, offset: u64, len: u64) -> Result<Self> {
        let window = Window::new(file, offset, len)
            .with_context(|| "duplicating the AppImage descriptor".to_string())?;
        debug!(
            offset,
            physical_len = window.physical_len,
            virtual_size = window.virtual_size,
            "using descriptor window"
        );
        Ok(Self::Window(window))
    }

    pub fn kind(&self) -> BackingKind {
        match self {
            Self::TempFile { .. } => BackingKind::TempFile,
            Self::Window(_) => BackingKind::Window,
        }
    }

    /// Size the reader reports, padding included.
    pub fn len(&self) -> u64 {
        match self {
            Self::TempFile { len, .. } => *len,
            Self::Window(window) => window.virtual_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh buffered reader positioned at the start of the image.
    pub fn reader(&self) -> Result<Box<dyn RandomAccess + '_>> {
        match self {
            Self::TempFile { file, .. } => {
                let reopened = file
                    .reopen()
                    .with_context(|| format!("reopening {}", file.path().display()))?;
                Ok(Box::new(BufReader::new(reopened)))
            }
            Self::Window(window) => {
                Ok(Box::new(BufReader::new(WindowReader { window, pos: 0 })))
            }
        }
    }

    /// Like [`reader`](Self::reader), but the first `head.len()` bytes read
    /// as `head`. The store itself is never written.
    pub fn reader_with_head(&self, head: Vec<u8>) -> Result<Box<dyn RandomAccess + '_>> {
        let inner = self.reader()?;
        Ok(Box::new(BufReader::new(Overlay {
            inner,
            head,
            pos: 0,
        })))
    }
}

/// Serves `head` in place of the first bytes of `inner`.
struct Overlay<R> {
    inner: R,
    head: Vec<u8>,
    pos: u64,
}

impl<R: Read + Seek> Read for Overlay<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let head_len = self.head.len() as u64;
        if self.pos >= head_len {
            let n = self.inner.read(buf)?;
            self.pos += n as u64;
            return Ok(n);
        }

        let start = self.pos as usize;
        let n = buf.len().min(self.head.len() - start);
        buf[..n].copy_from_slice(&self.head[start..start + n]);
        self.pos += n as u64;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(n)
    }
}

impl<R: Seek> Seek for Overlay<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.inner.seek(pos)?;
        Ok(self.pos)
    }
}

fn copy_region(
    file: &File,
    offset: u64,
    len: u64,
    chunk_size: usize,
    temp_dir: Option<&Path>,
) -> io::Result<BackingStore> {
    let mut builder = Builder::new();
    builder.prefix("appicon-").suffix(".squashfs");
    let mut temp = match temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let mut source = file.try_clone()?;
    source.seek(SeekFrom::Start(offset))?;
    let mut source = source.take(len);

    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut copied = 0u64;
    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        temp.write_all(&chunk[..n])?;
        copied += n as u64;
    }
    temp.flush()?;

    if copied != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("copied {copied} of {len} bytes"),
        ));
    }

    debug!(path = %temp.path().display(), len, "copied embedded image");
    Ok(BackingStore::TempFile { file: temp, len })
}
