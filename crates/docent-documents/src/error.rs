use docent_index::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("malformed {format} document: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("registry is corrupt: {0}")]
    Registry(#[from] serde_json::Error),

    #[error("parser task failed: {0}")]
    Task(String),
}

impl DocumentError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) | Self::FileTooLarge(_) => ErrorKind::InvalidInput,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Self::Registry(_) => ErrorKind::CorruptState,
            _ => ErrorKind::DependencyFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;
