//! Types d'erreurs pour amkloader

use std::path::PathBuf;

/// Erreurs d'énumération des sources
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("Playlist error in {path}: {reason}")]
    Playlist { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour amkloader
pub type Result<T> = std::result::Result<T, Error>;
