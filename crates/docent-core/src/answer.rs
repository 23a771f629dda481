use std::fmt::Write as _;
use std::sync::Arc;

use docent_index::SearchHit;
use docent_llm::{ChatProvider, EmbeddingProvider, Message};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::{EventKind, PipelineEvent};
use crate::retrieve::{RetrievalRequest, RetrievalService};

const SYSTEM_PROMPT: &str = "Answer the question using only the numbered context passages. \
If the context does not contain the answer, say so.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub trace_id: Uuid,
    pub answer: String,
    pub sources: Vec<SearchHit>,
    pub trace: Vec<String>,
}

/// Render retrieved passages and the question into one prompt.
///
/// Each passage becomes a `[Context i] Source: <file>, <location>` block, numbered
/// from 1 in rank order. With no hits the prompt is just the question.
#[must_use]
pub fn build_prompt(query: &str, hits: &[SearchHit]) -> String {
    let mut prompt = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            prompt.push_str("\n\n");
        }
        let _ = write!(
            prompt,
            "[Context {}] Source: {}, {}\n{}",
            i + 1,
            hit.filename,
            hit.source,
            hit.text
        );
    }
    let _ = write!(prompt, "\n\nQuestion: {query}\nAnswer:");
    prompt
}

/// Retrieves context for a question and asks the chat model.
pub struct AnswerService<E, C> {
    retrieval: Arc<RetrievalService<E>>,
    chat: Arc<C>,
}

impl<E, C> std::fmt::Debug for AnswerService<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerService")
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider, C: ChatProvider> AnswerService<E, C> {
    #[must_use]
    pub fn new(retrieval: Arc<RetrievalService<E>>, chat: Arc<C>) -> Self {
        Self { retrieval, chat }
    }

    /// Answer `request.query` from the selected documents.
    ///
    /// The model is asked even when retrieval finds nothing.
    ///
    /// # Errors
    ///
    /// Any retrieval error, or [`CoreError::Generation`] when the chat backend fails.
    #[tracing::instrument(skip_all)]
    pub async fn answer(&self, request: RetrievalRequest) -> Result<Answer> {
        let query = request.query.trim().to_owned();
        let retrieval = self.retrieval.retrieve(request).await?;
        let trace_id = retrieval.trace_id;
        let mut trace = retrieval.trace;

        PipelineEvent::new(
            "answer",
            "answer",
            EventKind::Answer,
            trace_id,
            serde_json::json!({ "query": query, "num_contexts": retrieval.hits.len() }),
        )
        .emit();

        let prompt = build_prompt(&query, &retrieval.hits);
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let answer = self.chat.chat(&messages).await.map_err(|e| {
            tracing::error!(%trace_id, "generation failed: {e}");
            CoreError::Generation(e)
        })?;
        let answer = answer.trim().to_owned();
        trace.push("Answer generated".to_owned());

        PipelineEvent::new(
            "answer",
            "client",
            EventKind::Answer,
            trace_id,
            serde_json::json!({ "answer": answer }),
        )
        .emit();

        Ok(Answer {
            trace_id,
            answer,
            sources: retrieval.hits,
            trace,
        })
    }
}
