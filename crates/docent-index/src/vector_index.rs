//! Flat inner-product index with row-aligned metadata.

use uuid::Uuid;

use crate::error::{IndexError, Result};
use crate::types::{IndexedEntry, ScoredEntry};

/// Exhaustive inner-product index over fixed-dimension vectors.
///
/// Row `i` of the vector matrix and `entries[i]` always describe the same
/// chunk. Rows are only ever appended; nothing is updated in place. Scores are
/// raw dot products, so callers wanting cosine similarity must store and query
/// with unit-norm vectors.
#[derive(Clone, PartialEq)]
pub struct VectorIndex {
    dim: usize,
    /// Row-major `rows * dim` matrix.
    vectors: Vec<f32>,
    entries: Vec<IndexedEntry>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dim", &self.dim)
            .field("rows", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Create an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ZeroDimension`] when `dim` is 0.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dim,
            vectors: Vec::new(),
            entries: Vec::new(),
        })
    }

    /// Rebuild from raw parts read back from disk.
    pub(crate) fn from_parts(
        dim: usize,
        vectors: Vec<f32>,
        entries: Vec<IndexedEntry>,
    ) -> Result<Self> {
        if dim == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if vectors.len() != entries.len() * dim {
            return Err(IndexError::RowCountMismatch {
                vectors: vectors.len() / dim,
                entries: entries.len(),
            });
        }
        Ok(Self {
            dim,
            vectors,
            entries,
        })
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexedEntry] {
        &self.entries
    }

    /// Vector stored at `row`, if any.
    #[must_use]
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dim)?;
        self.vectors.get(start..start + self.dim)
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    fn check(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
            return Err(IndexError::NonFiniteVector { position });
        }
        Ok(())
    }

    /// Append one row. Returns the row id, which equals the previous length.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector has the wrong dimension or a non-finite
    /// component; the index is left unchanged.
    pub fn add(&mut self, vector: &[f32], entry: IndexedEntry) -> Result<usize> {
        self.check(vector)?;
        let row = self.entries.len();
        self.vectors.extend_from_slice(vector);
        self.entries.push(entry);
        Ok(row)
    }

    /// Append many rows, all or nothing. Returns the id of the first new row.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch lengths differ or any vector is invalid;
    /// no row is appended in that case.
    pub fn add_batch(&mut self, vectors: &[Vec<f32>], entries: Vec<IndexedEntry>) -> Result<usize> {
        if vectors.len() != entries.len() {
            return Err(IndexError::BatchMismatch {
                vectors: vectors.len(),
                entries: entries.len(),
            });
        }
        for vector in vectors {
            self.check(vector)?;
        }
        let first = self.entries.len();
        self.vectors.reserve(vectors.len() * self.dim);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.entries.extend(entries);
        Ok(first)
    }

    /// Up to `top_k` rows by descending inner product with `query`.
    ///
    /// Equal scores keep row order.
    ///
    /// # Errors
    ///
    /// Returns an error if `query` has the wrong dimension or a non-finite component.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>> {
        self.check(query)?;
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dim)
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(row, score)| ScoredEntry {
                score,
                row,
                entry: self.entries[row].clone(),
            })
            .collect())
    }

    /// A fresh index holding every row except those of `document_id`.
    ///
    /// Rows keep their relative order and are renumbered from 0.
    #[must_use]
    pub fn without_document(&self, document_id: Uuid) -> Self {
        let mut vectors = Vec::with_capacity(self.vectors.len());
        let mut entries = Vec::with_capacity(self.entries.len());
        for (row, entry) in self.vectors.chunks_exact(self.dim).zip(&self.entries) {
            if entry.document_id != document_id {
                vectors.extend_from_slice(row);
                entries.push(entry.clone());
            }
        }
        Self {
            dim: self.dim,
            vectors,
            entries,
        }
    }
}
