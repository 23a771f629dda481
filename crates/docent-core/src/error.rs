use docent_documents::DocumentError;
use docent_index::IndexError;
pub use docent_index::ErrorKind;
use docent_llm::LlmError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl CoreError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidInput,
            Self::DocumentNotFound(_) => ErrorKind::NotFound,
            Self::Index(e) => e.kind(),
            Self::Document(e) => e.kind(),
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Self::Embedding(_) | Self::Generation(_) | Self::Io(_) | Self::Task(_) => {
                ErrorKind::DependencyFailure
            }
        }
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Structured failure reported to callers instead of a bare message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CoreError> for Failure {
    fn from(e: &CoreError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
