use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file id escapes the project root: {0}")]
    OutsideRoot(String),

    #[error("error walking file tree: {0}")]
    Walk(#[from] ignore::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;
