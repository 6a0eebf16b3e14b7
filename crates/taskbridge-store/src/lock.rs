//! Advisory locking for the link file.
//!
//! One run per vault: the lock is taken before collect and held until the
//! link file is rewritten. A second run against the same vault fails fast
//! with a distinguishable busy error instead of queueing.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another sync run holds the lock at {0:?}")]
    Busy(PathBuf),

    #[error("failed to open lock file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquires the lock file next to `link_path` (same name plus a
    /// `.lock` suffix), without blocking.
    pub fn acquire(link_path: &Path) -> Result<Self, LockError> {
        let mut os_name = link_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "links".into());
        os_name.push(".lock");
        let path = link_path.with_file_name(os_name);

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(err) if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(LockError::Busy(path))
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Best effort; the OS releases the lock with the handle anyway.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let link_path = dir.path().join("links.json");

        let lock = StoreLock::acquire(&link_path).unwrap();
        assert!(lock.path().ends_with("links.json.lock"));
        drop(lock);

        // Released on drop: a second acquire succeeds.
        StoreLock::acquire(&link_path).unwrap();
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let link_path = dir.path().join("links.json");

        let _held = StoreLock::acquire(&link_path).unwrap();
        match StoreLock::acquire(&link_path) {
            Err(LockError::Busy(path)) => assert!(path.ends_with("links.json.lock")),
            other => panic!("expected busy lock, got {other:?}"),
        }
    }
}
