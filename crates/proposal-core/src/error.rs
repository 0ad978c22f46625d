//! Error type shared by every proposal crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A source file could not be read or parsed.
    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Inference error: {0}")]
    Inference(String),

    /// Corpus index build, snapshot or search failure.
    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    // Language model transport.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The provider answered with an error status or an error event.
    #[error("Provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error came from invoking the language model.
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::Provider { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
