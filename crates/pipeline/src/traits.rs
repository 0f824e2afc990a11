use crate::{Document, DocumentId, ExtractError, StorageError};
use std::path::Path;

/// Turns one file into a [`Document`].
///
/// Implementations must tolerate concurrent calls: multiple indexing jobs and
/// the change detector extract simultaneously.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Document, ExtractError>;
}

/// Full-text index storage.
///
/// Each call is assumed individually atomic; the indexing core does not add
/// its own serialization on top.
pub trait IndexStorage: Send + Sync {
    fn document_exists(&self, id: &DocumentId) -> Result<bool, StorageError>;
    fn add_document(&self, document: &Document) -> Result<(), StorageError>;
    fn update_document(&self, document: &Document) -> Result<(), StorageError>;
    fn remove_document(&self, id: &DocumentId) -> Result<(), StorageError>;
}

/// Vector-embedding store, keyed by document id.
pub trait EmbeddingStore: Send + Sync {
    fn add_document_embedding(&self, id: &DocumentId, text: &str) -> Result<(), StorageError>;
    fn remove_document_embedding(&self, id: &DocumentId) -> Result<(), StorageError>;
}
