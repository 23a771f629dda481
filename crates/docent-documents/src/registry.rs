//! JSON list of ingested documents (`files.json`).

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use docent_index::{CatalogEntry, FileLock, IndexCatalog};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// One ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: Uuid,
    pub name: String,
    pub index_path: PathBuf,
    pub upload_dir: PathBuf,
}

/// Registry of ingested documents, persisted as a JSON array.
///
/// The file is the source of truth and may be shared by several processes.
/// Mutations hold an exclusive lock on `<path>.lock`, re-read the file, and
/// replace it through a temp file and rename. Reads load the current file
/// without locking, since a rename never exposes a partial write.
pub struct DocumentRegistry {
    path: PathBuf,
    lock_path: PathBuf,
    cache: RwLock<Vec<RegistryEntry>>,
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn read_entries(path: &Path) -> Result<Vec<RegistryEntry>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

impl DocumentRegistry {
    /// Open the registry at `path`; a missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = read_entries(&path)?;
        let mut lock_path = OsString::from(path.as_os_str());
        lock_path.push(".lock");
        Ok(Self {
            path,
            lock_path: PathBuf::from(lock_path),
            cache: RwLock::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries on disk. If the file cannot be read the last good
    /// snapshot is returned.
    fn snapshot(&self) -> Vec<RegistryEntry> {
        match read_entries(&self.path) {
            Ok(entries) => {
                let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
                cache.clone_from(&entries);
                entries
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "registry reload failed: {e}");
                self.cache
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            }
        }
    }

    #[must_use]
    pub fn list(&self) -> Vec<RegistryEntry> {
        self.snapshot()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<RegistryEntry> {
        self.snapshot().into_iter().find(|e| e.id == id)
    }

    /// All entries whose file name equals `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Vec<RegistryEntry> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// Append `entry`, replacing an existing entry with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be locked, re-read or written.
    pub fn insert(&self, entry: RegistryEntry) -> Result<()> {
        self.update(|entries| {
            entries.retain(|e| e.id != entry.id);
            entries.push(entry);
            true
        })?;
        Ok(())
    }

    /// Remove the entries with the given ids and return them.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be locked, re-read or written.
    pub fn remove(&self, ids: &[Uuid]) -> Result<Vec<RegistryEntry>> {
        let mut removed = Vec::new();
        self.update(|entries| {
            let (gone, kept): (Vec<_>, Vec<_>) =
                entries.drain(..).partition(|e| ids.contains(&e.id));
            *entries = kept;
            removed = gone;
            !removed.is_empty()
        })?;
        Ok(removed)
    }

    /// Read-modify-write under the registry lock. `apply` returns whether it
    /// changed anything worth writing.
    fn update(&self, apply: impl FnOnce(&mut Vec<RegistryEntry>) -> bool) -> Result<()> {
        let _lock = FileLock::exclusive(&self.lock_path)?;
        let mut entries = read_entries(&self.path)?;
        if apply(&mut entries) {
            self.persist(&entries)?;
        }
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = entries;
        Ok(())
    }

    fn persist(&self, entries: &[RegistryEntry]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl IndexCatalog for DocumentRegistry {
    fn resolve(&self, document_id: Uuid) -> Option<CatalogEntry> {
        self.get(document_id).map(|e| CatalogEntry {
            index_path: e.index_path,
            filename: e.name,
        })
    }
}
