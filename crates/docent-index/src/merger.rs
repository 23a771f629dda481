//! Fan a query vector out over several document indexes and merge the hits.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::locks::IndexLocks;
use crate::persist;
use crate::types::SearchHit;

/// Where a document's index lives and how to label its hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub index_path: PathBuf,
    pub filename: String,
}

/// Resolves document ids to their index artifacts.
pub trait IndexCatalog: Send + Sync {
    /// `None` when the id is not registered.
    fn resolve(&self, document_id: Uuid) -> Option<CatalogEntry>;
}

impl IndexCatalog for HashMap<Uuid, CatalogEntry> {
    fn resolve(&self, document_id: Uuid) -> Option<CatalogEntry> {
        self.get(&document_id).cloned()
    }
}

/// Merged result of a multi-index search.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// At most `top_k` hits, best first.
    pub hits: Vec<SearchHit>,
    /// Human-readable record of the steps taken.
    pub trace: Vec<String>,
    /// Requested ids that were not searched because they are unknown or their
    /// index no longer exists.
    pub skipped: Vec<Uuid>,
}

enum Lookup {
    Unknown,
    Missing(String),
    Searched(String, Vec<SearchHit>),
}

/// Concatenate per-index hit lists and keep the `top_k` best.
///
/// The sort is stable: equal scores keep the order of `lists`, and within a
/// list, their per-index rank.
#[must_use]
pub fn merge_hits(lists: Vec<Vec<SearchHit>>, top_k: usize) -> Vec<SearchHit> {
    let mut all: Vec<SearchHit> = lists.into_iter().flatten().collect();
    all.sort_by(|a, b| b.score.total_cmp(&a.score));
    all.truncate(top_k);
    all
}

/// Searches the indexes of selected documents and ranks their hits together.
pub struct RetrievalMerger {
    catalog: Arc<dyn IndexCatalog>,
    locks: Arc<IndexLocks>,
}

impl std::fmt::Debug for RetrievalMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalMerger")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl RetrievalMerger {
    #[must_use]
    pub fn new(catalog: Arc<dyn IndexCatalog>, locks: Arc<IndexLocks>) -> Self {
        Self { catalog, locks }
    }

    /// Search every resolvable document and return the global `top_k`.
    ///
    /// Unknown ids are skipped and traced. Indexes are searched concurrently,
    /// each under its read lock, and merged in request order.
    ///
    /// # Errors
    ///
    /// - [`IndexError::InvalidRequest`] for an empty vector, no ids, or `top_k == 0`,
    ///   before any index is touched.
    /// - Any load or search failure of a resolved index, e.g.
    ///   [`IndexError::DimensionMismatch`] when the query was embedded with a
    ///   different model.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        document_ids: &[Uuid],
        top_k: usize,
    ) -> Result<Retrieval> {
        if query_vector.is_empty() {
            return Err(IndexError::InvalidRequest("query vector is empty".into()));
        }
        if document_ids.is_empty() {
            return Err(IndexError::InvalidRequest("no document ids given".into()));
        }
        if top_k == 0 {
            return Err(IndexError::InvalidRequest("top_k must be positive".into()));
        }

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = document_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        let query: Arc<[f32]> = Arc::from(query_vector);

        let lookups = ids.iter().map(|&id| {
            let entry = self.catalog.resolve(id);
            let query = Arc::clone(&query);
            async move {
                let Some(entry) = entry else {
                    return Ok(Lookup::Unknown);
                };
                self.search_one(id, entry, query, top_k).await
            }
        });
        let results = futures::future::join_all(lookups).await;

        let mut out = Retrieval::default();
        let mut per_index = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result? {
                Lookup::Unknown => {
                    tracing::warn!(document_id = %id, "skipping unknown document id");
                    out.trace.push(format!("Skipping unknown document_id {id}"));
                    out.skipped.push(*id);
                }
                Lookup::Missing(filename) => {
                    tracing::warn!(document_id = %id, %filename, "index artifact missing");
                    out.trace
                        .push(format!("Index for {filename} is missing, skipping"));
                    out.skipped.push(*id);
                }
                Lookup::Searched(filename, hits) => {
                    out.trace.push(format!("Loading index for {filename}"));
                    out.trace.push(format!("Searching index for {filename}"));
                    out.trace
                        .push(format!("Found {} hits in {filename}", hits.len()));
                    per_index.push(hits);
                }
            }
        }

        out.trace.push("Merging and sorting all hits".to_owned());
        out.hits = merge_hits(per_index, top_k);
        out.trace
            .push(format!("Selected top {} results overall", out.hits.len()));
        tracing::debug!(
            requested = ids.len(),
            skipped = out.skipped.len(),
            hits = out.hits.len(),
            "retrieval merged"
        );
        Ok(out)
    }

    async fn search_one(
        &self,
        document_id: Uuid,
        entry: CatalogEntry,
        query: Arc<[f32]>,
        top_k: usize,
    ) -> Result<Lookup> {
        let guard = self.locks.read(&entry.index_path).await?;
        let CatalogEntry {
            index_path,
            filename,
        } = entry;
        tokio::task::spawn_blocking(move || {
            let lookup = search_index(&index_path, filename, &query, document_id, top_k);
            drop(guard);
            lookup
        })
        .await
        .map_err(|e| IndexError::Task(e.to_string()))?
    }
}

fn search_index(
    index_path: &Path,
    filename: String,
    query: &[f32],
    document_id: Uuid,
    top_k: usize,
) -> Result<Lookup> {
    if !persist::exists(index_path) {
        return Ok(Lookup::Missing(filename));
    }
    let index = persist::load(index_path, None)?;
    let hits = index
        .search(query, top_k)?
        .into_iter()
        .map(|scored| SearchHit::tagged(scored, document_id, &filename))
        .collect();
    Ok(Lookup::Searched(filename, hits))
}
