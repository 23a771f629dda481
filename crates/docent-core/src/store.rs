//! On-disk layout shared by every service: uploads, per-document indexes,
//! the registry, and the locks guarding each index.
//!
//! Index locks are backed by lock files under `locks/`, so several
//! processes may serve the same data directory.

use std::collections::HashSet;
use std::sync::Arc;

use docent_documents::{DocumentRegistry, RegistryEntry};
use docent_index::{IndexCatalog, IndexLocks, RetrievalMerger, persist};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::events::{EventKind, PipelineEvent};

/// Which documents a delete applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    All,
    Names(Vec<String>),
}

#[derive(Clone)]
pub struct DocumentStore {
    storage: StorageConfig,
    registry: Arc<DocumentRegistry>,
    locks: Arc<IndexLocks>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("data_dir", &self.storage.data_dir)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Create the data directories if needed and open the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or the registry is unreadable.
    pub fn open(storage: StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(storage.uploads_dir())?;
        std::fs::create_dir_all(storage.indexes_dir())?;
        std::fs::create_dir_all(storage.locks_dir())?;
        let registry = DocumentRegistry::open(storage.registry_path())?;
        tracing::debug!(
            data_dir = %storage.data_dir.display(),
            documents = registry.list().len(),
            "opened document store"
        );
        let locks = IndexLocks::with_lock_dir(storage.locks_dir());
        Ok(Self::new(storage, Arc::new(registry), Arc::new(locks)))
    }

    #[must_use]
    pub fn new(
        storage: StorageConfig,
        registry: Arc<DocumentRegistry>,
        locks: Arc<IndexLocks>,
    ) -> Self {
        Self {
            storage,
            registry,
            locks,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn locks(&self) -> &Arc<IndexLocks> {
        &self.locks
    }

    /// Merger resolving ids through this store's registry.
    #[must_use]
    pub fn merger(&self) -> RetrievalMerger {
        let catalog: Arc<dyn IndexCatalog> = Arc::<DocumentRegistry>::clone(&self.registry);
        RetrievalMerger::new(catalog, Arc::clone(&self.locks))
    }

    #[must_use]
    pub fn list_documents(&self) -> Vec<RegistryEntry> {
        self.registry.list()
    }

    /// Delete the selected documents: index artifacts, retained upload and
    /// registry entry, one document at a time under its index write lock.
    ///
    /// Names that match nothing are ignored. Returns the names actually removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an artifact or the registry cannot be updated. Documents
    /// deleted before the failure stay deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_documents(&self, selection: &Selection) -> Result<Vec<String>> {
        let targets = self.select(selection);
        let trace_id = Uuid::new_v4();
        let mut removed = Vec::with_capacity(targets.len());

        for entry in targets {
            let write = self.locks.write(&entry.index_path).await?;
            let registry = Arc::clone(&self.registry);
            let id = entry.id;
            let name = entry.name.clone();
            let unregistered = tokio::task::spawn_blocking(move || -> Result<bool> {
                persist::remove(&entry.index_path)?;
                match std::fs::remove_dir_all(&entry.upload_dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                let gone = registry.remove(&[entry.id])?;
                drop(write);
                Ok(!gone.is_empty())
            })
            .await??;
            if unregistered {
                tracing::debug!(document_id = %id, %name, "deleted document");
                removed.push(name);
            } else {
                tracing::debug!(document_id = %id, "document already deleted elsewhere");
            }
        }

        self.locks.prune();
        PipelineEvent::new(
            "admin",
            "store",
            EventKind::Delete,
            trace_id,
            serde_json::json!({ "deleted": removed }),
        )
        .emit();
        tracing::info!(count = removed.len(), "documents deleted");
        Ok(removed)
    }

    fn select(&self, selection: &Selection) -> Vec<RegistryEntry> {
        match selection {
            Selection::All => self.registry.list(),
            Selection::Names(names) => {
                let mut seen = HashSet::new();
                names
                    .iter()
                    .flat_map(|n| self.registry.find_by_name(n))
                    .filter(|e| seen.insert(e.id))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use docent_index::{IndexedEntry, ProvenanceTag, VectorIndex};

    use super::*;

    fn store(dir: &Path) -> DocumentStore {
        DocumentStore::open(StorageConfig {
            data_dir: dir.to_path_buf(),
        })
        .unwrap()
    }

    fn register(store: &DocumentStore, name: &str) -> RegistryEntry {
        let id = Uuid::new_v4();
        let index_path = store.storage().index_path(id);
        let upload_dir = store.storage().upload_dir(id);
        std::fs::create_dir_all(&upload_dir).unwrap();
        std::fs::write(upload_dir.join(name), "body").unwrap();

        let mut index = VectorIndex::new(2).unwrap();
        index
            .add(
                &[1.0, 0.0],
                IndexedEntry {
                    text: "body".into(),
                    source: ProvenanceTag::Txt { line: 1 },
                    filename: name.into(),
                    document_id: id,
                },
            )
            .unwrap();
        persist::save(&index, &index_path).unwrap();

        let entry = RegistryEntry {
            id,
            name: name.into(),
            index_path,
            upload_dir,
        };
        store.registry().insert(entry.clone()).unwrap();
        entry
    }

    #[test]
    fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        assert!(s.storage().uploads_dir().is_dir());
        assert!(s.storage().indexes_dir().is_dir());
        assert_eq!(s.locks().lock_dir(), Some(s.storage().locks_dir().as_path()));
        assert!(s.list_documents().is_empty());
    }

    #[tokio::test]
    async fn delete_by_name_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let a = register(&s, "a.txt");
        let b = register(&s, "b.txt");

        let removed = s
            .delete_documents(&Selection::Names(vec!["a.txt".into(), "missing.txt".into()]))
            .await
            .unwrap();

        assert_eq!(removed, vec!["a.txt".to_string()]);
        assert!(!persist::exists(&a.index_path));
        assert!(!a.upload_dir.exists());
        assert!(persist::exists(&b.index_path));
        let names: Vec<String> = s.list_documents().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b.txt".to_string()]);
    }

    #[tokio::test]
    async fn delete_all_empties_registry() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        register(&s, "a.txt");
        register(&s, "b.csv");

        let mut removed = s.delete_documents(&Selection::All).await.unwrap();
        removed.sort();
        assert_eq!(removed, vec!["a.txt".to_string(), "b.csv".to_string()]);
        assert!(s.list_documents().is_empty());

        let reopened = store(dir.path());
        assert!(reopened.list_documents().is_empty());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let a = register(&s, "a.txt");
        persist::remove(&a.index_path).unwrap();
        std::fs::remove_dir_all(&a.upload_dir).unwrap();

        let removed = s.delete_documents(&Selection::All).await.unwrap();
        assert_eq!(removed, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn second_store_sees_deletes_and_skips_them() {
        let dir = tempfile::tempdir().unwrap();
        let first = store(dir.path());
        let second = store(dir.path());
        register(&first, "a.txt");
        assert_eq!(second.list_documents().len(), 1);

        let removed = first.delete_documents(&Selection::All).await.unwrap();
        assert_eq!(removed, vec!["a.txt".to_string()]);
        assert!(second.list_documents().is_empty());
        assert!(
            second
                .delete_documents(&Selection::All)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn selection_serializes() {
        let json = serde_json::to_value(Selection::Names(vec!["a.pdf".into()])).unwrap();
        assert_eq!(json, serde_json::json!({"names": ["a.pdf"]}));
        assert_eq!(serde_json::to_value(Selection::All).unwrap(), "all");
    }
}
