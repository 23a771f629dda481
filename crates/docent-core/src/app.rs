//! Wires configuration into providers, storage and the services.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use docent_documents::{DocumentParser, RegistryEntry};
use docent_index::{Chunker, HfTokenizer, TokenCodec};
use docent_llm::hashed::HashEmbedder;
use docent_llm::http::default_client;
use docent_llm::ollama::OllamaProvider;
use docent_llm::openai::OpenAiProvider;
use docent_llm::{AnyProvider, ChatProvider, EmbeddingProvider, Normalized};
use uuid::Uuid;

use crate::answer::{Answer, AnswerService};
use crate::config::{ChatProviderKind, Config, EmbeddingProviderKind};
use crate::error::Result;
use crate::ingest::{IngestionResult, IngestionService};
use crate::retrieve::{RetrievalRequest, RetrievalResult, RetrievalService};
use crate::store::{DocumentStore, Selection};

/// Embedding backend chosen from configuration.
pub type ConfiguredEmbedder = Normalized<AnyProvider>;

/// All services over one data directory.
pub struct Docent<E = ConfiguredEmbedder, C = AnyProvider> {
    config: Config,
    store: DocumentStore,
    ingestion: IngestionService<E>,
    retrieval: Arc<RetrievalService<E>>,
    answers: AnswerService<E, C>,
}

impl<E, C> std::fmt::Debug for Docent<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Docent")
            .field("store", &self.store)
            .field("ingestion", &self.ingestion)
            .finish_non_exhaustive()
    }
}

impl Docent {
    /// Build providers from `config` and open its data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the tokenizer cannot be
    /// loaded, or the data directory cannot be opened.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let embedder = create_embedder(&config)?;
        let chat = create_chat_provider(&config)?;
        Self::with_providers(config, embedder, chat)
    }
}

impl<E: EmbeddingProvider, C: ChatProvider> Docent<E, C> {
    /// # Errors
    ///
    /// Returns an error if the tokenizer cannot be loaded or the data directory
    /// cannot be opened.
    pub fn with_providers(config: Config, embedder: E, chat: C) -> anyhow::Result<Self> {
        let codec = create_tokenizer(config.chunking.tokenizer_path.as_deref())?;
        let chunker = Arc::new(Chunker::new(codec, config.chunker_config())?);
        let store = DocumentStore::open(config.storage.clone())
            .with_context(|| format!("failed to open {}", config.storage.data_dir.display()))?;
        let embedder = Arc::new(embedder);

        let ingestion = IngestionService::new(
            store.clone(),
            DocumentParser::new(config.documents.max_file_size),
            chunker,
            Arc::clone(&embedder),
            config.embedding.batch_size,
        );
        let retrieval = Arc::new(RetrievalService::new(
            embedder,
            store.merger(),
            config.retrieval.top_k,
        ));
        let answers = AnswerService::new(Arc::clone(&retrieval), Arc::new(chat));

        Ok(Self {
            config,
            store,
            ingestion,
            retrieval,
            answers,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// # Errors
    ///
    /// See [`IngestionService::ingest`].
    pub async fn ingest(&self, path: &Path) -> Result<IngestionResult> {
        self.ingestion.ingest(path).await
    }

    /// # Errors
    ///
    /// See [`RetrievalService::retrieve`].
    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult> {
        self.retrieval.retrieve(request).await
    }

    /// # Errors
    ///
    /// See [`AnswerService::answer`].
    pub async fn answer(&self, request: RetrievalRequest) -> Result<Answer> {
        self.answers.answer(request).await
    }

    #[must_use]
    pub fn list_documents(&self) -> Vec<RegistryEntry> {
        self.store.list_documents()
    }

    /// # Errors
    ///
    /// See [`DocumentStore::delete_documents`].
    pub async fn delete_documents(&self, selection: &Selection) -> Result<Vec<String>> {
        self.store.delete_documents(selection).await
    }

    /// # Errors
    ///
    /// See [`IngestionService::rebuild_document`].
    pub async fn rebuild_document(&self, document_id: Uuid) -> Result<IngestionResult> {
        self.ingestion.rebuild_document(document_id).await
    }

    /// Every registered document id, in registry order.
    #[must_use]
    pub fn all_document_ids(&self) -> Vec<Uuid> {
        self.store.list_documents().into_iter().map(|e| e.id).collect()
    }
}

/// # Errors
///
/// Returns an error if the HTTP client for an OpenAI-compatible backend cannot be built.
pub fn create_embedder(config: &Config) -> anyhow::Result<ConfiguredEmbedder> {
    let cfg = &config.embedding;
    let provider = match cfg.provider {
        EmbeddingProviderKind::Ollama => AnyProvider::Ollama(OllamaProvider::new(
            &cfg.base_url,
            config.llm.model.clone(),
            cfg.model.clone(),
        )),
        EmbeddingProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            default_client()?,
            &cfg.base_url,
            cfg.api_key.clone(),
            config.llm.model.clone(),
            cfg.model.clone(),
        )),
        EmbeddingProviderKind::Hash => AnyProvider::Hash(HashEmbedder::new(cfg.dim)),
    };
    tracing::debug!(
        provider = cfg.provider.as_str(),
        model = %cfg.model,
        normalize = cfg.normalize,
        "embedding provider ready"
    );
    Ok(Normalized::new(provider).enabled(cfg.normalize))
}

/// # Errors
///
/// Returns an error if the HTTP client for an OpenAI-compatible backend cannot be built.
pub fn create_chat_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let cfg = &config.llm;
    let provider = match cfg.provider {
        ChatProviderKind::Ollama => AnyProvider::Ollama(OllamaProvider::new(
            &cfg.base_url,
            cfg.model.clone(),
            config.embedding.model.clone(),
        )),
        ChatProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            default_client()?,
            &cfg.base_url,
            cfg.api_key.clone(),
            cfg.model.clone(),
            config.embedding.model.clone(),
        )),
    };
    tracing::debug!(provider = cfg.provider.as_str(), model = %cfg.model, "chat provider ready");
    Ok(provider)
}

/// Tokenizer from `tokenizer.json`, or the built-in byte-level codec.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded.
pub fn create_tokenizer(path: Option<&Path>) -> anyhow::Result<Arc<dyn TokenCodec>> {
    let tokenizer = match path {
        Some(path) => HfTokenizer::from_file(path)
            .with_context(|| format!("failed to load tokenizer {}", path.display()))?,
        None => HfTokenizer::byte_level()?,
    };
    Ok(Arc::new(tokenizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_provider_from_config() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::Hash;
        config.embedding.dim = 16;
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "hash");
        assert!(embedder.is_enabled());
    }

    #[test]
    fn default_providers_are_ollama() {
        let config = Config::default();
        assert_eq!(create_embedder(&config).unwrap().name(), "ollama");
        assert!(matches!(
            create_chat_provider(&config).unwrap(),
            AnyProvider::Ollama(_)
        ));
    }

    #[test]
    fn openai_providers_build() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::OpenAi;
        config.embedding.normalize = false;
        config.llm.provider = ChatProviderKind::OpenAi;
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.name(), "openai");
        assert!(!embedder.is_enabled());
        assert!(matches!(
            create_chat_provider(&config).unwrap(),
            AnyProvider::OpenAi(_)
        ));
    }

    #[test]
    fn missing_tokenizer_file_fails() {
        let err = create_tokenizer(Some(Path::new("/nonexistent/tokenizer.json")))
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to load tokenizer"));
        assert!(create_tokenizer(None).is_ok());
    }

    #[test]
    fn from_config_opens_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.embedding.provider = EmbeddingProviderKind::Hash;
        let docent = Docent::from_config(config).unwrap();
        assert!(docent.list_documents().is_empty());
        assert!(dir.path().join("data/indexes").is_dir());
    }
}
