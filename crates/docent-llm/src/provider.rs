use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Maps text to fixed-dimension vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts`, returning exactly one vector per input in input order.
    ///
    /// No retries happen here; a failed call fails the whole batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or returns a different number of vectors.
    fn embed_texts(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    fn name(&self) -> &'static str;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or does not return exactly one vector.
    fn embed_one(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        let input = vec![text.to_owned()];
        async move {
            let mut out = self.embed_texts(&input).await?;
            if out.is_empty() {
                return Err(LlmError::EmptyResponse {
                    provider: self.name(),
                });
            }
            ensure_count(self.name(), 1, out.len())?;
            out.pop().ok_or(LlmError::EmptyResponse {
                provider: self.name(),
            })
        }
    }
}

/// Produces an assistant reply for a conversation.
pub trait ChatProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Fail with [`LlmError::CountMismatch`] unless a backend returned one vector per input.
///
/// # Errors
///
/// Returns an error when `actual != expected`.
pub fn ensure_count(provider: &'static str, expected: usize, actual: usize) -> Result<(), LlmError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LlmError::CountMismatch {
            provider,
            expected,
            actual,
        })
    }
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Wraps a provider so every returned vector has unit L2 norm.
///
/// Inner-product search over normalized vectors ranks by cosine similarity.
/// A disabled wrapper passes vectors through unchanged.
#[derive(Debug, Clone)]
pub struct Normalized<P> {
    inner: P,
    enabled: bool,
}

impl<P> Normalized<P> {
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            enabled: true,
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: EmbeddingProvider> EmbeddingProvider for Normalized<P> {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = self.inner.embed_texts(texts).await?;
        if !self.enabled {
            return Ok(vectors);
        }
        for v in &mut vectors {
            normalize_l2(v);
        }
        Ok(vectors)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
