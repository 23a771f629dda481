//! Error types for docent-index.

use std::path::PathBuf;

/// Failure classes shared by every docent crate.
///
/// Request handlers report the kind together with the error message; the kind
/// decides whether a caller may retry, should fix its input, or has to rebuild
/// an index from its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any side effect: empty query, bad chunking parameters, unsupported file.
    InvalidInput,
    /// A referenced document or index does not exist.
    NotFound,
    /// Persisted index state violates row correspondence or its own header.
    CorruptState,
    /// An embedding backend, parser, or the filesystem failed.
    DependencyFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::CorruptState => "corrupt_state",
            Self::DependencyFailure => "dependency_failure",
        })
    }
}

/// Errors that can occur while chunking, indexing or searching.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading or writing index artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata artifact could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Chunk stride `chunk_size - overlap` is not positive.
    #[error("invalid chunking parameters: chunk_size={chunk_size}, overlap={overlap}")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    /// Tokenizer failed to load, encode or decode.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Vector length differs from the index dimension.
    #[error("dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector contains NaN or infinity.
    #[error("vector component {position} is not finite")]
    NonFiniteVector { position: usize },

    /// Vectors and entries passed to a batch append differ in length.
    #[error("batch has {vectors} vectors but {entries} entries")]
    BatchMismatch { vectors: usize, entries: usize },

    /// Nothing is persisted at the path and no dimension was supplied.
    #[error("no index at {} and no dimension given to initialize one", .0.display())]
    MissingDimension(PathBuf),

    /// An index must have at least one dimension.
    #[error("index dimension must be positive")]
    ZeroDimension,

    /// Vector and metadata artifacts disagree on the number of rows.
    #[error("row count mismatch: {vectors} vectors, {entries} metadata entries")]
    RowCountMismatch { vectors: usize, entries: usize },

    /// Artifact header, checksum or layout is invalid.
    #[error("corrupt index at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Request rejected before touching any index.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Blocking index task panicked or was cancelled.
    #[error("index task failed: {0}")]
    Task(String),
}

impl IndexError {
    /// Classify this error for callers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidChunking { .. }
            | Self::NonFiniteVector { .. }
            | Self::BatchMismatch { .. }
            | Self::MissingDimension(_)
            | Self::ZeroDimension
            | Self::InvalidRequest(_) => ErrorKind::InvalidInput,
            Self::DimensionMismatch { .. }
            | Self::RowCountMismatch { .. }
            | Self::Corrupt { .. }
            | Self::Json(_) => ErrorKind::CorruptState,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Self::Io(_) | Self::Tokenizer(_) | Self::Task(_) => ErrorKind::DependencyFailure,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
