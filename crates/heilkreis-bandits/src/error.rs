use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Malformed document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Policy table not persisted to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PolicyError {
    /// Fehler, mit denen der Prozess nicht starten darf.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
