//! Document ingestion: copy, parse, chunk, embed, index, register.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docent_documents::{DocumentError, DocumentParser, DocumentRegistry, ParsedUnit, RegistryEntry};
use docent_index::{Chunk, Chunker, IndexedEntry, VectorIndex, persist};
use docent_llm::provider::ensure_count;
use docent_llm::{EmbeddingProvider, LlmError};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::{EventKind, PipelineEvent};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub chunk_count: usize,
    pub document_id: Uuid,
    pub trace_id: Uuid,
}

/// Turns files into searchable per-document indexes.
pub struct IngestionService<E> {
    store: DocumentStore,
    parser: DocumentParser,
    chunker: Arc<Chunker>,
    embedder: Arc<E>,
    batch_size: usize,
}

impl<E> std::fmt::Debug for IngestionService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("store", &self.store)
            .field("chunker", &self.chunker)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider> IngestionService<E> {
    #[must_use]
    pub fn new(
        store: DocumentStore,
        parser: DocumentParser,
        chunker: Arc<Chunker>,
        embedder: Arc<E>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            parser,
            chunker,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest the file at `path` as a new document.
    ///
    /// The file is copied to `uploads/<id>/<name>` and that copy is parsed, so
    /// the document can later be rebuilt from it. Nothing is registered unless
    /// the index was saved; any failure removes the copy again.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Document`] for unsupported, oversized or unreadable files.
    /// - [`CoreError::InvalidRequest`] when the file yields no text.
    /// - [`CoreError::Embedding`] when the embedding backend fails.
    /// - [`CoreError::Index`] when the index cannot be written.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest(&self, path: &Path) -> Result<IngestionResult> {
        let trace_id = Uuid::new_v4();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                CoreError::InvalidRequest(format!("{} has no usable file name", path.display()))
            })?;
        if !self.parser.supports(path) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            return Err(DocumentError::UnsupportedFormat(format!(".{ext}")).into());
        }

        let document_id = Uuid::new_v4();
        let storage = self.store.storage();
        let upload_dir = storage.upload_dir(document_id);
        let upload = UploadGuard::new(upload_dir.clone());
        tokio::fs::create_dir_all(&upload_dir).await?;
        let stored = upload_dir.join(&name);
        tokio::fs::copy(path, &stored).await?;
        tracing::debug!(%document_id, stored = %stored.display(), "copied upload");

        let chunks = self.parse_and_chunk(&stored).await?;
        if chunks.is_empty() {
            return Err(CoreError::InvalidRequest(format!(
                "{name} contains no extractable text"
            )));
        }
        let vectors = embed_chunks(self.embedder.as_ref(), &chunks, self.batch_size).await?;
        let entries = to_entries(chunks, &name, document_id);
        let chunk_count = entries.len();

        let index_path = storage.index_path(document_id);
        let registry_entry = RegistryEntry {
            id: document_id,
            name: name.clone(),
            index_path: index_path.clone(),
            upload_dir,
        };
        let write = self.store.locks().write(&index_path).await?;
        let registry = Arc::clone(self.store.registry());
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut upload = upload;
            commit_document(&index_path, &vectors, entries, &registry, registry_entry)?;
            upload.disarm();
            drop(write);
            Ok(())
        })
        .await??;

        PipelineEvent::new(
            "ingestion",
            "index",
            EventKind::Ingest,
            trace_id,
            serde_json::json!({
                "document_id": document_id,
                "filename": name,
                "chunk_count": chunk_count,
                "tokenizer": self.chunker.codec_name(),
            }),
        )
        .emit();
        tracing::info!(%document_id, %name, chunk_count, "document ingested");

        Ok(IngestionResult {
            chunk_count,
            document_id,
            trace_id,
        })
    }

    /// Re-parse a document's retained upload and replace its index.
    ///
    /// This is the recovery path for an index reported as corrupt, and for
    /// picking up new chunking settings or a new embedding model.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DocumentNotFound`] when `document_id` is not registered,
    ///   including when it is deleted before the new index is written.
    /// - Any parse, embedding or index error; the old index is left in place.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_document(&self, document_id: Uuid) -> Result<IngestionResult> {
        let trace_id = Uuid::new_v4();
        let entry = self
            .store
            .registry()
            .get(document_id)
            .ok_or_else(|| CoreError::DocumentNotFound(document_id.to_string()))?;
        let source = entry.upload_dir.join(&entry.name);

        let chunks = self.parse_and_chunk(&source).await?;
        if chunks.is_empty() {
            return Err(CoreError::InvalidRequest(format!(
                "{} contains no extractable text",
                entry.name
            )));
        }
        let vectors = embed_chunks(self.embedder.as_ref(), &chunks, self.batch_size).await?;
        let entries = to_entries(chunks, &entry.name, document_id);
        let chunk_count = entries.len();

        let write = self.store.locks().write(&entry.index_path).await?;
        let index_path = entry.index_path.clone();
        let registry = Arc::clone(self.store.registry());
        tokio::task::spawn_blocking(move || -> Result<()> {
            // A delete may have won the lock while this rebuild was embedding.
            if registry.get(document_id).is_none() {
                return Err(CoreError::DocumentNotFound(document_id.to_string()));
            }
            let mut index = VectorIndex::new(dimension_of(&vectors)?)?;
            index.add_batch(&vectors, entries)?;
            persist::save(&index, &index_path)?;
            drop(write);
            Ok(())
        })
        .await??;

        PipelineEvent::new(
            "admin",
            "index",
            EventKind::Rebuild,
            trace_id,
            serde_json::json!({
                "document_id": document_id,
                "filename": entry.name,
                "chunk_count": chunk_count,
            }),
        )
        .emit();
        tracing::info!(%document_id, chunk_count, "document rebuilt");

        Ok(IngestionResult {
            chunk_count,
            document_id,
            trace_id,
        })
    }

    async fn parse_and_chunk(&self, path: &Path) -> Result<Vec<Chunk>> {
        let units: Vec<ParsedUnit> = self.parser.parse(path).await?;
        let chunker = Arc::clone(&self.chunker);
        let chunks = tokio::task::spawn_blocking(move || {
            chunker.chunk_units(units.iter().map(|u| (u.text.as_str(), u.source)))
        })
        .await??;
        tracing::debug!(chunks = chunks.len(), "chunked document");
        Ok(chunks)
    }
}

/// Embed chunk texts in batches of `batch_size`, one vector per chunk in order.
///
/// # Errors
///
/// Returns [`CoreError::Embedding`] if any batch fails or comes back short.
pub async fn embed_chunks<E: EmbeddingProvider>(
    embedder: &E,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let out = embedder
            .embed_texts(batch)
            .await
            .map_err(CoreError::Embedding)?;
        ensure_count(embedder.name(), batch.len(), out.len()).map_err(CoreError::Embedding)?;
        vectors.extend(out);
    }
    tracing::debug!(
        provider = embedder.name(),
        vectors = vectors.len(),
        "embedded chunks"
    );
    Ok(vectors)
}

fn to_entries(chunks: Vec<Chunk>, filename: &str, document_id: Uuid) -> Vec<IndexedEntry> {
    chunks
        .into_iter()
        .map(|c| IndexedEntry {
            text: c.text,
            source: c.source,
            filename: filename.to_owned(),
            document_id,
        })
        .collect()
}

fn dimension_of(vectors: &[Vec<f32>]) -> Result<usize> {
    match vectors.first().map(Vec::len) {
        Some(dim) if dim > 0 => Ok(dim),
        _ => Err(CoreError::Embedding(LlmError::Other(
            "embedding backend returned empty vectors".into(),
        ))),
    }
}

/// Append to the (new) index, save it, then register the document. A failed
/// registry write removes an index this call created.
fn commit_document(
    index_path: &Path,
    vectors: &[Vec<f32>],
    entries: Vec<IndexedEntry>,
    registry: &DocumentRegistry,
    entry: RegistryEntry,
) -> Result<()> {
    let existed = persist::exists(index_path);
    let mut index = persist::load(index_path, Some(dimension_of(vectors)?))?;
    index.add_batch(vectors, entries)?;
    persist::save(&index, index_path)?;

    if let Err(e) = registry.insert(entry) {
        if !existed && let Err(cleanup) = persist::remove(index_path) {
            tracing::warn!(
                path = %index_path.display(),
                "failed to remove unregistered index: {cleanup}"
            );
        }
        return Err(e.into());
    }
    Ok(())
}

/// Removes an upload directory on drop unless disarmed.
struct UploadGuard {
    dir: PathBuf,
    armed: bool,
}

impl UploadGuard {
    fn new(dir: PathBuf) -> Self {
        Self { dir, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => tracing::debug!(dir = %self.dir.display(), "removed failed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(dir = %self.dir.display(), "failed to remove upload: {e}"),
        }
    }
}
