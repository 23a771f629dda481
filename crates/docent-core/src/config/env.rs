use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_storage();
        self.apply_env_overrides_embedding();
        self.apply_env_overrides_llm();
    }

    fn apply_env_overrides_storage(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCENT_CHUNK_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.chunking.chunk_size = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_CHUNK_OVERLAP") {
            if let Ok(n) = v.parse::<usize>() {
                self.chunking.overlap = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_CHUNK_OVERLAP value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_TOKENIZER_PATH") {
            self.chunking.tokenizer_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("DOCENT_TOP_K") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.top_k = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_MAX_FILE_SIZE") {
            if let Ok(n) = v.parse::<u64>() {
                self.documents.max_file_size = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_MAX_FILE_SIZE value: {v}");
            }
        }
    }

    fn apply_env_overrides_embedding(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid DOCENT_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_DIM") {
            if let Ok(n) = v.parse::<usize>() {
                self.embedding.dim = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_EMBEDDING_DIM value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_BATCH_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.embedding.batch_size = n;
            } else {
                tracing::warn!("ignoring invalid DOCENT_EMBEDDING_BATCH_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_EMBEDDING_NORMALIZE") {
            if let Ok(enabled) = v.parse::<bool>() {
                self.embedding.normalize = enabled;
            } else {
                tracing::warn!("ignoring invalid DOCENT_EMBEDDING_NORMALIZE value: {v}");
            }
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("DOCENT_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid DOCENT_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCENT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DOCENT_OPENAI_API_KEY") {
            self.embedding.api_key = Some(v.clone());
            self.llm.api_key = Some(v);
        }
    }
}
