//! Deterministic local embedder based on feature hashing.
//!
//! Needs no model or network: every lowercase word and its character
//! trigrams are hashed with blake3 into a signed bucket. Texts sharing
//! vocabulary land close together, which is enough for offline use and tests.

use crate::error::LlmError;
use crate::provider::{EmbeddingProvider, normalize_l2};

/// Default dimension, matching common small sentence-embedding models.
pub const DEFAULT_DIM: usize = 384;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: DEFAULT_DIM }
    }
}

impl HashEmbedder {
    /// A zero `dim` is raised to 1.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed one text. The result has unit norm unless the text has no words.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            self.accumulate(&mut v, b"w:", word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!("^{word}$").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.accumulate(&mut v, b"g:", gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }
        normalize_l2(&mut v);
        v
    }

    fn accumulate(&self, v: &mut [f32], namespace: &[u8], feature: &[u8], weight: f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(namespace);
        hasher.update(feature);
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let bucket = u64::from_le_bytes(word) % self.dim as u64;
        #[allow(clippy::cast_possible_truncation)]
        let bucket = bucket as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn deterministic_and_unit_norm() {
        let e = HashEmbedder::new(64);
        let a = e.embed("Quarterly revenue grew by 12 percent");
        let b = e.embed("Quarterly revenue grew by 12 percent");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        let e = HashEmbedder::default();
        assert_eq!(e.embed("Hello, World!"), e.embed("hello world"));
    }

    #[test]
    fn related_text_scores_higher() {
        let e = HashEmbedder::default();
        let query = e.embed("invoice payment terms");
        let related = e.embed("payment terms for each invoice are thirty days");
        let unrelated = e.embed("the cat slept on the warm windowsill");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8);
        assert_eq!(e.embed("  ... "), vec![0.0; 8]);
    }

    #[test]
    fn zero_dim_is_raised() {
        assert_eq!(HashEmbedder::new(0).dim(), 1);
    }

    #[tokio::test]
    async fn batch_preserves_order_and_count() {
        let e = HashEmbedder::new(16);
        let texts = vec!["one".to_owned(), "two".to_owned(), "three".to_owned()];
        let out = e.embed_texts(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], e.embed("two"));
    }
}
