//! Per-index reader/writer locks keyed by artifact path.
//!
//! Inside one process a tokio [`RwLock`] per path orders tasks. When the
//! locks are given a lock directory, each guard also holds an advisory
//! [`FileLock`] there, so separate `docent` processes sharing a data
//! directory exclude each other the same way.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs4::FileExt;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::{IndexError, Result};

/// Advisory lock on a file, released when dropped.
///
/// The file is created if missing and never removed, so every process
/// locks the same inode.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until an exclusive lock on `path` is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub fn exclusive(path: &Path) -> std::io::Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock(&file)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Block until a shared lock on `path` is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub fn shared(path: &Path) -> std::io::Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), "failed to release lock: {e}");
        }
    }
}

fn open_lock_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

/// Held access to one index; dropping it releases both lock levels.
#[derive(Debug)]
pub struct IndexGuard {
    _file: Option<FileLock>,
    _read: Option<OwnedRwLockReadGuard<()>>,
    _write: Option<OwnedRwLockWriteGuard<()>>,
}

/// Registry of one [`RwLock`] per index path.
///
/// Writers hold the write guard across load → mutate → save; searches hold a
/// read guard across load → search. Different paths never contend.
#[derive(Default)]
pub struct IndexLocks {
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
    lock_dir: Option<PathBuf>,
}

impl std::fmt::Debug for IndexLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexLocks")
            .field("tracked", &self.len())
            .field("lock_dir", &self.lock_dir)
            .finish()
    }
}

impl IndexLocks {
    /// Locks that only order tasks within this process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks that also exclude other processes, through lock files in `dir`.
    #[must_use]
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            locks: Mutex::default(),
            lock_dir: Some(dir.into()),
        }
    }

    #[must_use]
    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    fn key(path: &Path) -> PathBuf {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn lock_for(&self, key: &Path) -> Arc<RwLock<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(key.to_path_buf()).or_default())
    }

    /// Lock file guarding `key`, named by a hash of the absolute index path.
    fn lock_file_for(&self, key: &Path) -> Option<PathBuf> {
        let dir = self.lock_dir.as_ref()?;
        let digest = blake3::hash(key.as_os_str().as_encoded_bytes());
        Some(dir.join(format!("{}.lock", &digest.to_hex()[..32])))
    }

    async fn lock_file(&self, key: &Path, exclusive: bool) -> Result<Option<FileLock>> {
        let Some(lock_path) = self.lock_file_for(key) else {
            return Ok(None);
        };
        let lock = tokio::task::spawn_blocking(move || {
            if exclusive {
                FileLock::exclusive(&lock_path)
            } else {
                FileLock::shared(&lock_path)
            }
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))??;
        Ok(Some(lock))
    }

    /// Shared access for searching the index at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cross-process lock file cannot be locked.
    pub async fn read(&self, path: &Path) -> Result<IndexGuard> {
        let key = Self::key(path);
        let read = self.lock_for(&key).read_owned().await;
        let file = self.lock_file(&key, false).await?;
        Ok(IndexGuard {
            _file: file,
            _read: Some(read),
            _write: None,
        })
    }

    /// Exclusive access for mutating, replacing or removing the index at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cross-process lock file cannot be locked.
    pub async fn write(&self, path: &Path) -> Result<IndexGuard> {
        let key = Self::key(path);
        let write = self.lock_for(&key).write_owned().await;
        let file = self.lock_file(&key, true).await?;
        Ok(IndexGuard {
            _file: file,
            _read: None,
            _write: Some(write),
        })
    }

    /// Drop locks nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - map.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
