//! Content-addressed archive cache
//!
//! Layout under the cache root:
//!
//! ```text
//! {root}/{host}/{user}/{repo}/
//! ├── {commit}.tar.gz     # immutable, keyed by full commit hash
//! ├── {commit}.zip
//! └── refs.json           # last known ref name -> commit hash snapshot
//! ```
//!
//! Everything written here goes through a temporary file in the same
//! directory followed by a rename, so a reader never observes a partial
//! archive or snapshot.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::refs::RefMap;
use crate::error::{Result, TargitError};
use crate::locator::{ArchiveType, RepoReference};

/// File name of the ref snapshot inside a cache entry
pub const REFS_FILE: &str = "refs.json";

/// Default cache root (`~/.targit`)
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".targit"))
        .unwrap_or_else(|| PathBuf::from(".targit"))
}

/// Cache of downloaded archives and ref snapshots
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    root: PathBuf,
}

impl ArchiveCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache entry directory for one repository
    pub fn entry_dir(&self, reference: &RepoReference) -> PathBuf {
        self.root
            .join(reference.host().as_str())
            .join(reference.user())
            .join(reference.repo())
    }

    /// Path of the archive for `commit` in `archive_type` format
    pub fn locate(
        &self,
        reference: &RepoReference,
        commit: &str,
        archive_type: ArchiveType,
    ) -> PathBuf {
        self.entry_dir(reference)
            .join(format!("{}.{}", commit, archive_type.extension()))
    }

    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Create the entry directory for `reference` if missing
    pub async fn ensure_dir(&self, reference: &RepoReference) -> Result<PathBuf> {
        let dir = self.entry_dir(reference);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| TargitError::io(&dir, e))?;
        Ok(dir)
    }

    /// Load the ref snapshot of an entry.
    ///
    /// A missing or unreadable snapshot is reported as `None`; it only ever
    /// serves as a fallback.
    pub async fn load_refs(&self, entry_dir: &Path) -> Option<RefMap> {
        let path = entry_dir.join(REFS_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Failed to read ref snapshot {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<RefMap>(&bytes) {
            Ok(refs) => Some(refs),
            Err(e) => {
                log::warn!("Ignoring unparsable ref snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrite the ref snapshot of an entry
    pub async fn store_refs(&self, entry_dir: &Path, refs: &RefMap) -> Result<()> {
        let path = entry_dir.join(REFS_FILE);
        let bytes = serde_json::to_vec_pretty(refs).map_err(|e| {
            TargitError::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        let dir = entry_dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| TargitError::io(&dir, e))?;
            tmp.write_all(&bytes).map_err(|e| TargitError::io(tmp.path(), e))?;
            tmp.persist(&path)
                .map_err(|e| TargitError::io(&path, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| TargitError::io(entry_dir, std::io::Error::other(e)))?
    }

    /// Start writing a new archive into `entry_dir`
    pub fn begin_archive(&self, entry_dir: &Path) -> Result<PendingArchive> {
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(entry_dir)
            .map_err(|e| TargitError::io(entry_dir, e))?;
        Ok(PendingArchive { temp })
    }
}

/// An archive being written; removed on drop unless committed
#[derive(Debug)]
pub struct PendingArchive {
    temp: NamedTempFile,
}

impl PendingArchive {
    /// Async handle for writing the archive body
    pub fn writer(&self) -> Result<tokio::fs::File> {
        let file = self
            .temp
            .as_file()
            .try_clone()
            .map_err(|e| TargitError::io(self.temp.path(), e))?;
        Ok(tokio::fs::File::from_std(file))
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically move the finished archive to its final location
    pub fn commit(self, dest: &Path) -> Result<()> {
        self.temp
            .persist(dest)
            .map(|_| ())
            .map_err(|e| TargitError::io(dest, e.error))
    }
}
