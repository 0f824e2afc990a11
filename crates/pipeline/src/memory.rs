//! In-memory collaborator implementations.
//!
//! Used by the indexing core's test suites and by hosts that want a
//! self-contained setup without a real index or embedding backend.

use crate::{Document, DocumentId, EmbeddingStore, ExtractError, Extractor, IndexStorage,
    StorageError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Plain-text extractor: reads the file as UTF-8.
///
/// Test-grade stand-in for the application's per-format extraction engines.
#[derive(Debug, Default)]
pub struct TextExtractor {
    calls: AtomicUsize,
}

impl TextExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `extract` invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Document, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::InvalidData {
                ExtractError::Failed {
                    path: path.to_path_buf(),
                    reason: "not valid UTF-8 text".to_string(),
                }
            } else {
                ExtractError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Document::new(path, content).map_err(|source| ExtractError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// In-memory full-text index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: Mutex<HashMap<DocumentId, Document>>,
    adds: AtomicUsize,
    updates: AtomicUsize,
    removes: AtomicUsize,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().expect("index lock").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.documents.lock().expect("index lock").get(id).cloned()
    }

    #[must_use]
    pub fn add_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn remove_count(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

impl IndexStorage for MemoryIndex {
    fn document_exists(&self, id: &DocumentId) -> Result<bool, StorageError> {
        Ok(self.documents.lock().expect("index lock").contains_key(id))
    }

    fn add_document(&self, document: &Document) -> Result<(), StorageError> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .expect("index lock")
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn update_document(&self, document: &Document) -> Result<(), StorageError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut documents = self.documents.lock().expect("index lock");
        if !documents.contains_key(&document.id) {
            return Err(StorageError::NotFound(document.id.to_string()));
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn remove_document(&self, id: &DocumentId) -> Result<(), StorageError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().expect("index lock").remove(id);
        Ok(())
    }
}

/// In-memory embedding store; keeps the raw text in place of a vector.
#[derive(Debug, Default)]
pub struct MemoryEmbeddings {
    embeddings: Mutex<HashMap<DocumentId, String>>,
}

impl MemoryEmbeddings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.embeddings.lock().expect("embeddings lock").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.embeddings
            .lock()
            .expect("embeddings lock")
            .contains_key(id)
    }
}

impl EmbeddingStore for MemoryEmbeddings {
    fn add_document_embedding(&self, id: &DocumentId, text: &str) -> Result<(), StorageError> {
        self.embeddings
            .lock()
            .expect("embeddings lock")
            .insert(id.clone(), text.to_string());
        Ok(())
    }

    fn remove_document_embedding(&self, id: &DocumentId) -> Result<(), StorageError> {
        self.embeddings.lock().expect("embeddings lock").remove(id);
        Ok(())
    }
}
