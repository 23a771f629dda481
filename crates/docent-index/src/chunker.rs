//! Fixed-size overlapping token windows over parsed document units.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::tokenizer::TokenCodec;
use crate::types::{Chunk, ProvenanceTag};

/// Chunker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Tokens per chunk (default: 500).
    pub chunk_size: usize,
    /// Tokens shared by consecutive chunks (default: 50). Must be below `chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkerConfig {
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidChunking`] when the stride is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(IndexError::InvalidChunking {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance between consecutive window starts.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap)
    }
}

/// Token ranges covered by each chunk of an `n`-token sequence.
///
/// Windows start at 0 and advance by the stride; the window whose end reaches
/// `n` is the last one, so no chunk is a pure suffix of its predecessor.
///
/// # Errors
///
/// Returns [`IndexError::InvalidChunking`] for a non-positive stride.
pub fn chunk_spans(n: usize, config: &ChunkerConfig) -> Result<Vec<Range<usize>>> {
    config.validate()?;
    let stride = config.stride();
    let mut spans = Vec::with_capacity(n.div_ceil(stride));
    let mut start = 0;
    while start < n {
        let end = (start + config.chunk_size).min(n);
        spans.push(start..end);
        if end == n {
            break;
        }
        start += stride;
    }
    Ok(spans)
}

/// Splits text into token-bounded overlapping chunks.
#[derive(Clone)]
pub struct Chunker {
    codec: Arc<dyn TokenCodec>,
    config: ChunkerConfig,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("codec", &self.codec.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Chunker {
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidChunking`] if `config` has a non-positive stride.
    pub fn new(codec: Arc<dyn TokenCodec>, config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { codec, config })
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    #[must_use]
    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }

    /// Chunk a single unit. Every chunk carries `source` unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer fails to encode or decode.
    pub fn chunk(&self, text: &str, source: ProvenanceTag) -> Result<Vec<Chunk>> {
        let mut out = Vec::new();
        self.chunk_into(text, source, &mut out)?;
        Ok(out)
    }

    /// Chunk every unit of a document, numbering chunks across the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer fails on any unit.
    pub fn chunk_units<'a, I>(&self, units: I) -> Result<Vec<Chunk>>
    where
        I: IntoIterator<Item = (&'a str, ProvenanceTag)>,
    {
        let mut out = Vec::new();
        for (text, source) in units {
            self.chunk_into(text, source, &mut out)?;
        }
        Ok(out)
    }

    fn chunk_into(&self, text: &str, source: ProvenanceTag, out: &mut Vec<Chunk>) -> Result<()> {
        let tokens = self.codec.encode(text)?;
        for span in chunk_spans(tokens.len(), &self.config)? {
            let text = self.codec.decode(&tokens[span.clone()])?;
            out.push(Chunk {
                text,
                source,
                sequence_index: out.len(),
                token_start: span.start,
                token_end: span.end,
            });
        }
        Ok(())
    }
}
