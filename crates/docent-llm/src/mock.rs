//! Test-only scripted provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::hashed::HashEmbedder;
use crate::provider::{ChatProvider, EmbeddingProvider, Message};

/// Embeds with a [`HashEmbedder`] and answers from a queue of canned replies.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    embed_calls: Arc<AtomicUsize>,
    embedder: HashEmbedder,
    pub default_response: String,
    pub fail_embed: bool,
    pub fail_chat: bool,
    /// Drop the last vector of every batch to simulate a misbehaving backend.
    pub short_batches: bool,
    /// Milliseconds to sleep before returning embeddings.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            embedder: HashEmbedder::new(32),
            default_response: "mock response".into(),
            fail_embed: false,
            fail_chat: false,
            short_batches: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.embedder = HashEmbedder::new(dim);
        self
    }

    #[must_use]
    pub fn failing_embeddings() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Number of `embed_texts` calls made so far, including failed ones.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Every conversation passed to `chat`, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EmbeddingProvider for MockProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        let mut out: Vec<Vec<f32>> = texts.iter().map(|t| self.embedder.embed(t)).collect();
        if self.short_batches {
            out.pop();
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl ChatProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }
}
