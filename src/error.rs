//! Error types for the load order engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An identifier that is not part of the current sequence
    #[error("unknown entry '{0}'")]
    UnknownEntry(String),

    #[error("'{0}' is not a separator")]
    NotASeparator(String),

    #[error("'{0}' is not a mod")]
    NotAMod(String),

    /// Two entries share one identifier
    #[error("duplicate identifier '{0}' in sequence")]
    DuplicateIdentifier(String),

    /// The backing store rejected a read or write
    #[error("record store failed for {scope}: {message}")]
    Store { scope: String, message: String },

    #[error("failed to access '{path}': {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
