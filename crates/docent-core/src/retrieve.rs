use std::sync::Arc;

use docent_index::{RetrievalMerger, SearchHit};
use docent_llm::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::{EventKind, PipelineEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub document_ids: Vec<Uuid>,
    /// Falls back to the configured `retrieval.top_k`.
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Supplied by callers that already started a trace.
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

impl RetrievalRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, document_ids: Vec<Uuid>) -> Self {
        Self {
            query: query.into(),
            document_ids,
            top_k: None,
            trace_id: None,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub trace_id: Uuid,
    pub hits: Vec<SearchHit>,
    pub trace: Vec<String>,
    /// Requested ids that were unknown or had no index.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Uuid>,
}

/// Embeds a query and searches the selected documents.
pub struct RetrievalService<E> {
    embedder: Arc<E>,
    merger: RetrievalMerger,
    default_top_k: usize,
}

impl<E> std::fmt::Debug for RetrievalService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("merger", &self.merger)
            .field("default_top_k", &self.default_top_k)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider> RetrievalService<E> {
    #[must_use]
    pub fn new(embedder: Arc<E>, merger: RetrievalMerger, default_top_k: usize) -> Self {
        Self {
            embedder,
            merger,
            default_top_k,
        }
    }

    /// # Errors
    ///
    /// - [`CoreError::InvalidRequest`] for a blank query, no document ids or
    ///   `top_k == 0`, before anything is embedded.
    /// - [`CoreError::Embedding`] when the query cannot be embedded.
    /// - [`CoreError::Index`] when a resolved index fails to load or was built
    ///   with a different embedding dimension.
    #[tracing::instrument(skip_all, fields(documents = request.document_ids.len()))]
    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult> {
        let trace_id = request.trace_id.unwrap_or_else(Uuid::new_v4);
        let query = request.query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidRequest("query is empty".into()));
        }
        if request.document_ids.is_empty() {
            return Err(CoreError::InvalidRequest("no document ids given".into()));
        }
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(CoreError::InvalidRequest("top_k must be positive".into()));
        }

        PipelineEvent::new(
            "client",
            "retrieval",
            EventKind::Query,
            trace_id,
            serde_json::json!({ "query": query, "document_ids": request.document_ids }),
        )
        .emit();

        let mut trace = vec!["Received query".to_owned()];
        let vector = self
            .embedder
            .embed_one(query)
            .await
            .map_err(CoreError::Embedding)?;
        trace.push("Query embedded".to_owned());

        let retrieval = self
            .merger
            .retrieve(&vector, &request.document_ids, top_k)
            .await?;
        trace.extend(retrieval.trace);

        PipelineEvent::new(
            "retrieval",
            "answer",
            EventKind::Retrieval,
            trace_id,
            serde_json::json!({
                "hits": retrieval.hits.len(),
                "skipped": retrieval.skipped,
            }),
        )
        .emit();
        tracing::info!(%trace_id, hits = retrieval.hits.len(), "retrieval complete");

        Ok(RetrievalResult {
            trace_id,
            hits: retrieval.hits,
            trace,
            skipped: retrieval.skipped,
        })
    }
}
