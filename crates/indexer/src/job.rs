use crate::error::{IndexerError, Result};
use crate::events::{IndexingEvent, JobId};
use crate::progress::{IndexingStage, ProgressSnapshot};
use crate::scanner::FolderScanner;
use crate::stats::IndexingStatistics;
use crate::watcher::ChangeDetector;
use docfinder_pipeline::{Document, Extractor, FileTypeRegistry, IndexStorage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Documents are flushed to index storage in batches of this size.
const BATCH_SIZE: usize = 50;

/// Collaborators a folder indexing job works against.
///
/// All are shared across concurrent jobs and the change detector; the stores
/// are assumed individually safe under concurrent use.
#[derive(Clone)]
pub struct JobCollaborators {
    pub extractor: Arc<dyn Extractor>,
    pub index: Arc<dyn IndexStorage>,
    pub registry: Arc<FileTypeRegistry>,
    /// When present, the folder is registered for continued monitoring after
    /// the initial index completes.
    pub detector: Option<Arc<ChangeDetector>>,
}

/// One request to fully scan and index a single folder.
///
/// `run` executes on a dedicated worker thread: scan → per-file
/// extract/index → optional watch hand-off → completion statistics.
/// Cancellation is cooperative via [`IndexingJob::stop`].
pub struct IndexingJob {
    job_id: JobId,
    folder: PathBuf,
    collaborators: JobCollaborators,
    events: broadcast::Sender<IndexingEvent>,
    stop: Arc<AtomicBool>,
}

impl IndexingJob {
    #[must_use]
    pub fn new(
        job_id: JobId,
        folder: PathBuf,
        collaborators: JobCollaborators,
        events: broadcast::Sender<IndexingEvent>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            job_id,
            folder,
            collaborators,
            events,
            stop,
        }
    }

    /// Request cooperative cancellation. The flag is honored between
    /// filesystem operations; in-flight extraction of the current file is
    /// never interrupted.
    pub fn stop(&self) {
        log::info!("{}: stop requested", self.job_id);
        self.stop.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Execute the job to completion (or until stopped).
    ///
    /// Per-file failures are recorded in the statistics and never abort the
    /// job; only an invalid target folder is fatal. A stopped job still
    /// returns its partial statistics.
    pub fn run(&self) -> Result<IndexingStatistics> {
        let started = Instant::now();
        let mut stats = IndexingStatistics::new(self.folder.clone());

        if !self.folder.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "not a directory: {}",
                self.folder.display()
            )));
        }

        log::info!("{}: indexing folder {}", self.job_id, self.folder.display());

        // 1. Scan
        self.emit_progress(ProgressSnapshot::new(IndexingStage::Scanning, 0, 0));
        let scanner = FolderScanner::new(&self.folder, Arc::clone(&self.collaborators.registry));
        let files = scanner.scan(&self.stop, |snapshot| self.emit_progress(snapshot));
        stats.total_files_found = files.len();

        if files.is_empty() {
            // Zero candidates is a normal completion, not an error.
            log::info!("{}: no supported files in {}", self.job_id, self.folder.display());
            stats.elapsed = started.elapsed();
            return Ok(stats);
        }

        // 2. Process
        self.process_files(&files, &mut stats);

        self.emit_progress(ProgressSnapshot::new(
            IndexingStage::Indexing,
            stats.files_processed,
            stats.total_files_found,
        ));

        // 3. Watch hand-off
        if let Some(detector) = &self.collaborators.detector {
            if !self.stop.load(Ordering::Relaxed) {
                self.emit_progress(ProgressSnapshot::new(IndexingStage::Watching, 0, 0));
                if let Err(err) = detector.add_watch_path(&self.folder) {
                    log::error!(
                        "{}: failed to start watching {}: {err}",
                        self.job_id,
                        self.folder.display()
                    );
                    self.emit(IndexingEvent::JobError {
                        job_id: self.job_id,
                        context: "file_watching".to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        stats.elapsed = started.elapsed();
        log::info!(
            "{}: indexed {} ({} processed, {} failed, {} documents)",
            self.job_id,
            self.folder.display(),
            stats.files_processed,
            stats.files_failed,
            stats.documents_added
        );
        Ok(stats)
    }

    fn process_files(&self, files: &[PathBuf], stats: &mut IndexingStatistics) {
        let total = files.len();
        let mut batch: Vec<Document> = Vec::with_capacity(BATCH_SIZE);

        for (i, path) in files.iter().enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                log::info!("{}: processing stopped at {}/{}", self.job_id, i, total);
                break;
            }

            self.emit_progress(
                ProgressSnapshot::new(IndexingStage::Processing, i, total)
                    .with_file(path.clone()),
            );

            match self.collaborators.extractor.extract(path) {
                Ok(document) => {
                    batch.push(document);
                    stats.documents_added += 1;
                    stats.files_processed += 1;
                    self.emit(IndexingEvent::FileProcessed {
                        job_id: self.job_id,
                        path: path.clone(),
                        success: true,
                        error: None,
                    });
                }
                Err(err) => {
                    log::warn!("{}: extraction failed for {}: {err}", self.job_id, path.display());
                    stats.record_failure(path, &err);
                    self.emit(IndexingEvent::FileProcessed {
                        job_id: self.job_id,
                        path: path.clone(),
                        success: false,
                        error: Some(err.to_string()),
                    });
                }
            }

            self.emit_progress(
                ProgressSnapshot::new(IndexingStage::Processing, i + 1, total)
                    .with_file(path.clone()),
            );

            if batch.len() >= BATCH_SIZE {
                self.emit_progress(ProgressSnapshot::new(IndexingStage::Indexing, i + 1, total));
                self.flush_batch(&mut batch, stats);
            }
        }

        if !batch.is_empty() && !self.stop.load(Ordering::Relaxed) {
            self.flush_batch(&mut batch, stats);
        }
    }

    /// Flush one batch to index storage. A flush failure is reported but
    /// never blocks subsequent batches.
    fn flush_batch(&self, batch: &mut Vec<Document>, stats: &mut IndexingStatistics) {
        log::debug!("{}: flushing batch of {} documents", self.job_id, batch.len());

        for document in batch.drain(..) {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            if let Err(err) = self.collaborators.index.add_document(&document) {
                log::error!(
                    "{}: failed to index {}: {err}",
                    self.job_id,
                    document.path.display()
                );
                stats
                    .errors
                    .push(format!("{}: {err}", document.path.display()));
                self.emit(IndexingEvent::JobError {
                    job_id: self.job_id,
                    context: "batch_indexing".to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    fn emit_progress(&self, snapshot: ProgressSnapshot) {
        self.emit(IndexingEvent::Progress {
            job_id: self.job_id,
            snapshot,
        });
    }

    fn emit(&self, event: IndexingEvent) {
        // No receivers is fine; the host may not have subscribed yet.
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfinder_pipeline::memory::{MemoryIndex, TextExtractor};
    use pretty_assertions::assert_eq;

    fn collaborators(index: Arc<MemoryIndex>) -> JobCollaborators {
        JobCollaborators {
            extractor: Arc::new(TextExtractor::new()),
            index,
            registry: Arc::new(FileTypeRegistry::default()),
            detector: None,
        }
    }

    fn run_job(folder: &Path, index: Arc<MemoryIndex>) -> (IndexingStatistics, Vec<IndexingEvent>) {
        let (tx, mut rx) = broadcast::channel(1024);
        let job = IndexingJob::new(
            JobId(1),
            folder.to_path_buf(),
            collaborators(index),
            tx,
            Arc::new(AtomicBool::new(false)),
        );
        let stats = job.run().unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (stats, events)
    }

    #[test]
    fn empty_folder_completes_with_zero_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(MemoryIndex::new());
        let (stats, _) = run_job(dir.path(), Arc::clone(&index));

        assert_eq!(stats.total_files_found, 0);
        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.files_failed, 0);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn missing_folder_is_fatal() {
        let (tx, _rx) = broadcast::channel(16);
        let index = Arc::new(MemoryIndex::new());
        let job = IndexingJob::new(
            JobId(1),
            PathBuf::from("/nonexistent/folder"),
            collaborators(index),
            tx,
            Arc::new(AtomicBool::new(false)),
        );
        assert!(job.run().is_err());
    }

    #[test]
    fn failing_file_does_not_abort_the_job() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok1.txt"), "one").unwrap();
        std::fs::write(dir.path().join("ok2.txt"), "two").unwrap();
        // Invalid UTF-8 makes the text extractor fail deterministically.
        std::fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let index = Arc::new(MemoryIndex::new());
        let (stats, events) = run_job(dir.path(), Arc::clone(&index));

        assert_eq!(stats.total_files_found, 3);
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.documents_added, 2);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(index.len(), 2);

        let per_file: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, IndexingEvent::FileProcessed { .. }))
            .collect();
        assert_eq!(per_file.len(), 3);
        let failures = per_file
            .iter()
            .filter(|e| matches!(e, IndexingEvent::FileProcessed { success: false, .. }))
            .count();
        assert_eq!(failures, 1);
    }

    #[test]
    fn per_file_events_follow_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let index = Arc::new(MemoryIndex::new());
        let (_, events) = run_job(dir.path(), index);

        let processed: Vec<PathBuf> = events
            .iter()
            .filter_map(|e| match e {
                IndexingEvent::FileProcessed { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect();
        let mut sorted = processed.clone();
        sorted.sort();
        assert_eq!(processed, sorted);
    }

    #[test]
    fn stopped_job_returns_partial_statistics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let (tx, _rx) = broadcast::channel(64);
        let stop = Arc::new(AtomicBool::new(true));
        let index = Arc::new(MemoryIndex::new());
        let job = IndexingJob::new(
            JobId(1),
            dir.path().to_path_buf(),
            collaborators(Arc::clone(&index)),
            tx,
            stop,
        );

        let stats = job.run().unwrap();
        assert_eq!(stats.files_processed, 0);
        assert_eq!(index.len(), 0);
    }
}
