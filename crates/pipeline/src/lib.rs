//! # docfinder Pipeline
//!
//! Data model and collaborator seam for the docfinder indexing core.
//!
//! ## Pieces
//!
//! ```text
//! Path
//!   │
//!   ├──> FileTypeRegistry (extension filter, shared by scan & watch)
//!   │
//!   ├──> Extractor ──> Document (stable id = SHA-256 of absolute path)
//!   │
//!   └──> IndexStorage / EmbeddingStore (shared, concurrency-safe)
//! ```
//!
//! The extraction, index-storage, and embedding collaborators are traits:
//! the real engines live elsewhere in the application. The [`memory`]
//! module provides in-memory implementations for tests and self-contained
//! hosts.

mod document;
mod error;
mod file_types;
pub mod memory;
mod traits;

pub use document::{hex_encode, Document, DocumentId};
pub use error::{ExtractError, PipelineError, Result, StorageError};
pub use file_types::{FileType, FileTypeRegistry};
pub use traits::{EmbeddingStore, Extractor, IndexStorage};
