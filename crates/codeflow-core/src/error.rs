//! Error types for codeflow-core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from parser setup and configuration loading.
///
/// Malformed source text is never an error here: extraction degrades to a
/// best-effort handle set instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to initialize parser: {0}")]
    ParserInit(String),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
