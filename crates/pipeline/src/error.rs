use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure while turning a file into a [`crate::Document`].
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),

    #[error("extraction failed for {path}: {reason}")]
    Failed { path: PathBuf, reason: String },
}

/// Failure inside the index-storage or embedding-store collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
