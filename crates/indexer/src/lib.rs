//! # Docfinder Indexer
//!
//! Concurrent folder indexing for local document search.
//!
//! ## Pipeline
//!
//! ```text
//! Folder
//!     │
//!     ├──> Job Orchestrator (concurrency ceiling, lifecycle)
//!     │      └─> Indexing Job (worker thread)
//!     │            ├─> Folder Scanner ──> supported files
//!     │            ├─> Extract + batch index
//!     │            └─> Watch hand-off
//!     │
//!     └──> Change Detector (notify + dedup queue)
//!            └─> Incremental index updates
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docfinder_indexer::{
//!     ChangeDetector, DetectorCollaborators, DetectorConfig, JobCollaborators,
//!     JobOrchestrator, OrchestratorConfig, ThreadedExecutor,
//! };
//! use docfinder_pipeline::memory::{MemoryEmbeddings, MemoryIndex, TextExtractor};
//! use docfinder_pipeline::FileTypeRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(FileTypeRegistry::default());
//!     let index = Arc::new(MemoryIndex::new());
//!
//!     let detector = Arc::new(ChangeDetector::new(
//!         DetectorConfig::new("/path/to/data"),
//!         DetectorCollaborators {
//!             extractor: Arc::new(TextExtractor::new()),
//!             index: index.clone(),
//!             embeddings: Arc::new(MemoryEmbeddings::new()),
//!             registry: registry.clone(),
//!         },
//!     ));
//!     detector.start()?;
//!
//!     let orchestrator =
//!         JobOrchestrator::new(OrchestratorConfig::default(), Arc::new(ThreadedExecutor));
//!     let outcome = orchestrator.submit(
//!         "/path/to/documents",
//!         &JobCollaborators {
//!             extractor: Arc::new(TextExtractor::new()),
//!             index,
//!             registry,
//!             detector: Some(detector),
//!         },
//!     );
//!     println!("submitted: {outcome:?}");
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod executor;
mod fingerprint;
mod job;
mod orchestrator;
mod progress;
mod scanner;
mod stats;
mod watcher;

pub use config::{DetectorConfig, OrchestratorConfig};
pub use error::{IndexerError, Result};
pub use events::{IndexingEvent, JobId};
pub use executor::{ImmediateExecutor, JobExecutor, ThreadedExecutor};
pub use fingerprint::{
    FileChange, FileFingerprint, FingerprintCache, FINGERPRINT_SCHEMA_VERSION,
};
pub use job::{IndexingJob, JobCollaborators};
pub use orchestrator::{JobDetail, JobOrchestrator, JobState, StatusSummary, SubmitOutcome};
pub use progress::{IndexingStage, ProgressSnapshot};
pub use scanner::FolderScanner;
pub use stats::IndexingStatistics;
pub use watcher::{ChangeDetector, ChangeEvent, ChangeKind, DetectorCollaborators, DetectorStats};
