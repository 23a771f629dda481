use std::path::PathBuf;

use docent_documents::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Where uploads, indexes and the registry live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Directory holding one `<document_id>/` copy per ingested file.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    #[must_use]
    pub fn indexes_dir(&self) -> PathBuf {
        self.data_dir.join("indexes")
    }

    /// Lock files shared by every process using this data directory.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("files.json")
    }

    #[must_use]
    pub fn index_path(&self, document_id: uuid::Uuid) -> PathBuf {
        self.indexes_dir().join(format!("{document_id}.idx"))
    }

    #[must_use]
    pub fn upload_dir(&self, document_id: uuid::Uuid) -> PathBuf {
        self.uploads_dir().join(document_id.to_string())
    }
}

fn default_chunk_size() -> usize {
    500
}

fn default_overlap() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// `tokenizer.json` to count tokens with. The built-in byte-level codec is
    /// used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Ollama,
    OpenAi,
    Hash,
}

impl EmbeddingProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Hash => "hash",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

impl ChatProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_embedding_dim() -> usize {
    384
}

fn default_batch_size() -> usize {
    64
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Output dimension of the `hash` provider. Remote providers report their own.
    #[serde(default = "default_embedding_dim")]
    pub dim: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Scale vectors to unit length so inner-product search ranks by cosine.
    #[serde(default = "default_true")]
    pub normalize: bool,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            base_url: default_base_url(),
            model: default_embedding_model(),
            dim: default_embedding_dim(),
            batch_size: default_batch_size(),
            normalize: true,
            api_key: None,
        }
    }
}

fn default_chat_model() -> String {
    "llama3.2".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ChatProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ChatProviderKind::default(),
            base_url: default_base_url(),
            model: default_chat_model(),
            api_key: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}
