//! Persistence for the link map.
//!
//! The on-disk form is a JSON array sorted by `obs_id` with a trailing
//! newline. Writes are write-if-changed: the new serialization is compared
//! against the bytes read at load time and the file is only rewritten on a
//! difference, via a temp file and an atomic rename in the same directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use taskbridge_core::SyncLink;

#[derive(Debug, Error)]
pub enum LinkStoreError {
    #[error("failed to read link file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse link file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write link file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LinkStoreError>;

/// The persisted link map for one vault.
#[derive(Debug)]
pub struct LinkStore {
    path: PathBuf,
    links: Vec<SyncLink>,
    on_disk: Vec<u8>,
}

impl LinkStore {
    /// Opens the store at `path`. A missing file is an empty link set.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (links, on_disk) = match fs::read(&path) {
            Ok(bytes) => {
                let links =
                    serde_json::from_slice(&bytes).map_err(|source| LinkStoreError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                (links, bytes)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => (Vec::new(), Vec::new()),
            Err(source) => return Err(LinkStoreError::Read { path, source }),
        };
        Ok(Self {
            path,
            links,
            on_disk,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The links as loaded (or last saved), sorted by `obs_id`.
    pub fn links(&self) -> &[SyncLink] {
        &self.links
    }

    /// Replaces the link set and rewrites the file if the serialization
    /// changed. Returns whether a write happened.
    pub fn save(&mut self, mut links: Vec<SyncLink>) -> Result<bool> {
        links.sort_by(|a, b| a.obs_id.cmp(&b.obs_id));
        let mut bytes = serde_json::to_vec_pretty(&links).map_err(|source| LinkStoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        bytes.push(b'\n');

        if bytes == self.on_disk {
            self.links = links;
            return Ok(false);
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|source| LinkStoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|source| LinkStoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        std::io::Write::write_all(&mut tmp, &bytes).map_err(|source| LinkStoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tmp.persist(&self.path)
            .map_err(|err| LinkStoreError::Write {
                path: self.path.clone(),
                source: err.error,
            })?;

        self.links = links;
        self.on_disk = bytes;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskbridge_core::{ObsTaskId, RemTaskId};

    fn mock_link(obs: &str, rem: &str) -> SyncLink {
        SyncLink {
            obs_id: ObsTaskId::from(obs),
            rem_id: RemTaskId::from(rem),
            score: 0.9,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            last_synced: None,
            rem_list_id: None,
            rem_title_hash: None,
            rem_last_known_title: None,
            stale_runs: 0,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LinkStore::open(dir.path().join("links.json")).unwrap();
        assert!(store.links().is_empty());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");

        let mut store = LinkStore::open(&path).unwrap();
        let written = store
            .save(vec![mock_link("o2", "r2"), mock_link("o1", "r1")])
            .unwrap();
        assert!(written);

        let reloaded = LinkStore::open(&path).unwrap();
        assert_eq!(reloaded.links().len(), 2);
        // Sorted by obs_id regardless of insertion order.
        assert_eq!(reloaded.links()[0].obs_id, ObsTaskId::from("o1"));
    }

    #[test]
    fn test_write_if_changed_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");

        let mut store = LinkStore::open(&path).unwrap();
        assert!(store.save(vec![mock_link("o1", "r1")]).unwrap());
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        // Same content, different order: serialization is identical.
        assert!(!store.save(vec![mock_link("o1", "r1")]).unwrap());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn test_serialization_is_byte_deterministic() {
        let dir = tempfile::tempdir().unwrap();

        let path_a = dir.path().join("a.json");
        let mut store_a = LinkStore::open(&path_a).unwrap();
        store_a
            .save(vec![mock_link("o1", "r1"), mock_link("o2", "r2")])
            .unwrap();

        let path_b = dir.path().join("b.json");
        let mut store_b = LinkStore::open(&path_b).unwrap();
        store_b
            .save(vec![mock_link("o2", "r2"), mock_link("o1", "r1")])
            .unwrap();

        assert_eq!(fs::read(&path_a).unwrap(), fs::read(&path_b).unwrap());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("links.json");
        let mut store = LinkStore::open(&path).unwrap();
        store.save(vec![mock_link("o1", "r1")]).unwrap();
        assert!(path.exists());
    }
}
