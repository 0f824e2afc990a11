use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Extract(#[from] docfinder_pipeline::ExtractError),

    #[error(transparent)]
    Storage(#[from] docfinder_pipeline::StorageError),

    #[error("watch path does not exist: {0}")]
    WatchPathMissing(PathBuf),

    #[error("watch path is not a directory: {0}")]
    WatchPathNotDirectory(PathBuf),

    #[error("filesystem watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("detector is not running")]
    NotRunning,

    #[error("detector is already running")]
    AlreadyRunning,

    #[error("event queue closed")]
    QueueClosed,

    #[error("{0}")]
    Other(String),
}
