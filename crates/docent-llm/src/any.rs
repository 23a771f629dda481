use crate::error::LlmError;
use crate::hashed::HashEmbedder;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{ChatProvider, EmbeddingProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            AnyProvider::OpenAi($p) => $expr,
            AnyProvider::Hash($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Provider chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    Hash(HashEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl EmbeddingProvider for AnyProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_provider!(self, |p| p.embed_texts(texts).await)
    }

    fn name(&self) -> &'static str {
        delegate_provider!(self, |p| p.name())
    }
}

impl ChatProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        match self {
            Self::Ollama(p) => p.chat(messages).await,
            Self::OpenAi(p) => p.chat(messages).await,
            Self::Hash(_) => Err(LlmError::ChatUnsupported { provider: "hash" }),
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.chat(messages).await,
        }
    }
}
