//! Chunking, vector indexing and retrieval for document question answering.
//!
//! Parsed document units are split into overlapping token windows, embedded
//! elsewhere, and appended to a per-document inner-product index whose
//! vector rows stay aligned 1:1 with a metadata sequence. At query time
//! [`merger::RetrievalMerger`] searches several indexes and merges their hits
//! into one globally ranked list.

pub mod chunker;
pub mod error;
pub mod locks;
pub mod merger;
pub mod persist;
pub mod tokenizer;
pub mod types;
pub mod vector_index;

pub use chunker::{Chunker, ChunkerConfig, chunk_spans};
pub use error::{ErrorKind, IndexError, Result};
pub use locks::{FileLock, IndexGuard, IndexLocks};
pub use merger::{CatalogEntry, IndexCatalog, Retrieval, RetrievalMerger, merge_hits};
pub use tokenizer::{HfTokenizer, TokenCodec};
pub use types::{Chunk, IndexedEntry, ProvenanceTag, ScoredEntry, SearchHit};
pub use vector_index::VectorIndex;
