//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default sentence-embedding model used for corpus chunks and queries.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
/// Embedding dimension of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
/// Words per corpus chunk.
pub const DEFAULT_CHUNK_WINDOW: usize = 500;
/// Nearest neighbours fetched per query.
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_TEMPERATURE: f64 = 0.4;
pub const DEFAULT_MAX_TOKENS: usize = 4000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Paths to all data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Background corpus of prior proposals (`data/Training_Data/`).
    pub training: PathBuf,
    /// Generated proposals (`data/Proposals/`).
    pub output: PathBuf,
    /// Persisted corpus index (`data/index/`).
    pub index: PathBuf,
    /// ONNX model + tokenizer (`data/models/`).
    pub models: PathBuf,
    /// LLM provider configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
    /// Optional pipeline configuration (`data/proposal.json`).
    pub config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the root and index directories.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            training: root.join("Training_Data"),
            output: root.join("Proposals"),
            index: root.join("index"),
            models: root.join("models"),
            llm_config_file: root.join("llm-config.json"),
            config_file: root.join("proposal.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.index)?;
        Ok(())
    }
}

/// How the corpus index is refreshed between generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPolicy {
    /// Discard any persisted snapshot and rebuild on every request.
    Always,
    /// Reuse the persisted snapshot while the corpus fingerprint is unchanged.
    OnChange,
}

/// Top-level pipeline configuration, passed explicitly into each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalConfig {
    pub training_folder: PathBuf,
    pub output_folder: PathBuf,
    pub index_dir: PathBuf,
    pub model_dir: PathBuf,
    /// Provider credentials and model selection live here.
    pub llm_config_file: PathBuf,
    pub embedding_model_id: String,
    pub embedding_dim: usize,
    pub chunk_window_size: usize,
    pub top_k: usize,
    pub rebuild_policy: RebuildPolicy,
    pub temperature: f64,
    pub max_tokens: usize,
    pub request_timeout_secs: u64,
}

/// Partial configuration as read from `proposal.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverrides {
    training_folder: Option<PathBuf>,
    output_folder: Option<PathBuf>,
    index_dir: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    embedding_model_id: Option<String>,
    embedding_dim: Option<usize>,
    chunk_window_size: Option<usize>,
    top_k: Option<usize>,
    rebuild_policy: Option<RebuildPolicy>,
    temperature: Option<f64>,
    max_tokens: Option<usize>,
    request_timeout_secs: Option<u64>,
}

impl ProposalConfig {
    /// Defaults rooted at the given data paths.
    pub fn with_paths(paths: &DataPaths) -> Self {
        Self {
            training_folder: paths.training.clone(),
            output_folder: paths.output.clone(),
            index_dir: paths.index.clone(),
            model_dir: paths.models.clone(),
            llm_config_file: paths.llm_config_file.clone(),
            embedding_model_id: DEFAULT_EMBEDDING_MODEL.into(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            chunk_window_size: DEFAULT_CHUNK_WINDOW,
            top_k: DEFAULT_TOP_K,
            rebuild_policy: RebuildPolicy::OnChange,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load configuration: defaults, then `proposal.json`, then env vars.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self> {
        let paths = DataPaths::new(data_dir)?;
        let mut config = Self::with_paths(&paths);

        match std::fs::read_to_string(&paths.config_file) {
            Ok(raw) => {
                let overrides: ConfigOverrides = serde_json::from_str(&raw)?;
                config.apply(overrides);
                info!("Loaded config from {}", paths.config_file.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", paths.config_file.display());
            }
            Err(e) => return Err(e.into()),
        }

        if let Ok(dir) = std::env::var("PROPOSAL_TRAINING_DIR") {
            config.training_folder = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PROPOSAL_OUTPUT_DIR") {
            config.output_folder = PathBuf::from(dir);
        }
        if let Ok(model) = std::env::var("PROPOSAL_EMBEDDING_MODEL") {
            config.embedding_model_id = model;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, o: ConfigOverrides) {
        if let Some(v) = o.training_folder {
            self.training_folder = v;
        }
        if let Some(v) = o.output_folder {
            self.output_folder = v;
        }
        if let Some(v) = o.index_dir {
            self.index_dir = v;
        }
        if let Some(v) = o.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = o.embedding_model_id {
            self.embedding_model_id = v;
        }
        if let Some(v) = o.embedding_dim {
            self.embedding_dim = v;
        }
        if let Some(v) = o.chunk_window_size {
            self.chunk_window_size = v;
        }
        if let Some(v) = o.top_k {
            self.top_k = v;
        }
        if let Some(v) = o.rebuild_policy {
            self.rebuild_policy = v;
        }
        if let Some(v) = o.temperature {
            self.temperature = v;
        }
        if let Some(v) = o.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = o.request_timeout_secs {
            self.request_timeout_secs = v;
        }
    }

    /// Reject settings that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_window_size == 0 {
            return Err(Error::Config("chunk_window_size must be positive".into()));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be positive".into()));
        }
        if self.embedding_dim == 0 {
            return Err(Error::Config("embedding_dim must be positive".into()));
        }
        if self.embedding_model_id.trim().is_empty() {
            return Err(Error::Config("embedding_model_id is empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        let config = ProposalConfig::with_paths(&paths);

        assert_eq!(config.chunk_window_size, 500);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.embedding_model_id, "all-MiniLM-L6-v2");
        assert_eq!(config.rebuild_policy, RebuildPolicy::OnChange);
        assert!(paths.index.is_dir());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("proposal.json"),
            r#"{"top_k": 3, "rebuild_policy": "always", "chunk_window_size": 200}"#,
        )
        .unwrap();

        let config = ProposalConfig::load(dir.path()).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunk_window_size, 200);
        assert_eq!(config.rebuild_policy, RebuildPolicy::Always);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("proposal.json"), r#"{"chunk_window_size": 0}"#).unwrap();

        let err = ProposalConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
