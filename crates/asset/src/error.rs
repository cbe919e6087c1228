//! Errors surfaced by scene import.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a scene (and therefore a model) from a file.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported scene format: {0}")]
    UnsupportedFormat(String),
    #[error("malformed scene: {0:#}")]
    Parse(#[from] anyhow::Error),
    #[error("scene is incomplete")]
    Incomplete,
    #[error("scene has no root node")]
    MissingRoot,
}

pub type ImportResult<T> = Result<T, ImportError>;
