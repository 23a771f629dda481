//! Embedding and chat backends used by docent.

pub mod any;
pub mod error;
pub mod hashed;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{ChatProvider, EmbeddingProvider, Message, Normalized, Role, normalize_l2};
