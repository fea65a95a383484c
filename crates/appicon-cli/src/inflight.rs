//! At most one fetch per AppImage at a time.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// The key a path is tracked under: its canonical form, or the path as given
/// when it cannot be resolved.
pub fn canonical_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Paths with a fetch in progress, keyed by canonical path so that two
/// spellings of one file share a slot.
#[derive(Debug, Default)]
pub struct InFlight {
    paths: Mutex<HashSet<PathBuf>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path`. Returns `None` if another fetch already holds it.
    pub fn try_begin(&self, path: &Path) -> Option<FetchGuard<'_>> {
        let key = canonical_key(path);
        let mut paths = self.paths.lock().unwrap_or_else(|e| e.into_inner());
        if !paths.insert(key.clone()) {
            return None;
        }
        Some(FetchGuard {
            owner: self,
            path: key,
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.paths.lock().map(|paths| paths.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its path when dropped.
#[derive(Debug)]
pub struct FetchGuard<'a> {
    owner: &'a InFlight,
    path: PathBuf,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let mut paths = self.owner.paths.lock().unwrap_or_else(|e| e.into_inner());
        paths.remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_second_claim_is_refused_until_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.AppImage");
        fs::write(&path, b"x").unwrap();

        let inflight = InFlight::new();
        let guard = inflight.try_begin(&path).unwrap();
        assert!(inflight.try_begin(&path).is_none());
        assert_eq!(inflight.len(), 1);

        drop(guard);
        assert!(inflight.is_empty());
        assert!(inflight.try_begin(&path).is_some());
    }

    #[test]
    fn test_spellings_share_a_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.AppImage");
        fs::write(&path, b"x").unwrap();
        let dotted = dir.path().join(".").join("a.AppImage");

        let inflight = InFlight::new();
        let _guard = inflight.try_begin(&path).unwrap();
        assert!(inflight.try_begin(&dotted).is_none());
    }

    #[test]
    fn test_distinct_paths_are_independent() {
        let inflight = InFlight::new();
        let _a = inflight.try_begin(Path::new("/nonexistent/a")).unwrap();
        let _b = inflight.try_begin(Path::new("/nonexistent/b")).unwrap();
        assert_eq!(inflight.len(), 2);
    }
}
