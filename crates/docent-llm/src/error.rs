#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} returned {actual} embeddings for {expected} inputs")]
    CountMismatch {
        provider: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("chat not supported by {provider}")]
    ChatUnsupported { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
