mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use docent_index::ChunkerConfig;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings that would fail later at ingestion or query time.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first inconsistent value.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.chunker_config()
            .validate()
            .context("invalid [chunking] section")?;
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be positive");
        }
        if self.embedding.provider == EmbeddingProviderKind::Hash && self.embedding.dim == 0 {
            bail!("embedding.dim must be positive for the hash provider");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be positive");
        }
        if self.documents.max_file_size == 0 {
            bail!("documents.max_file_size must be positive");
        }
        Ok(())
    }

    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunking.chunk_size,
            overlap: self.chunking.overlap,
        }
    }
}

/// `--config` argument, then `DOCENT_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("DOCENT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
