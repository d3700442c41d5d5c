//! Types d'erreurs pour pmoplaylist

use std::time::Duration;

/// Erreurs de chargement et de résolution
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Resolution failed for {0}")]
    Unresolvable(String),

    #[error("Resolution of {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },

    #[error("Unsupported playlist format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    #[error("Invalid value {value:?} for option {option}")]
    InvalidConfig { option: &'static str, value: String },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour pmoplaylist
pub type Result<T> = std::result::Result<T, Error>;
