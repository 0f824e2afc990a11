//! Continued monitoring of indexed folders.
//!
//! Filesystem notifications arrive on the watcher backend's thread, get
//! filtered and deduplicated there, and are pushed onto a bounded queue. A
//! single consumer thread drains the queue and applies each change to the
//! index and embedding stores, so store writes from the detector are never
//! concurrent with each other.

use crate::config::DetectorConfig;
use crate::error::{IndexerError, Result};
use crate::fingerprint::{FileChange, FingerprintCache};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use docfinder_pipeline::{DocumentId, EmbeddingStore, Extractor, FileTypeRegistry, IndexStorage};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};
use walkdir::WalkDir;

/// Junk files the watcher ignores regardless of extension.
const EXCLUDED_NAMES: &[&str] = &["Thumbs.db", "Desktop.ini", ".DS_Store"];
const EXCLUDED_SUFFIXES: &[&str] = &[".tmp", ".temp", ".bak", ".log"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// One filesystem change, already filtered to supported files. Created by
/// the notification handler, consumed exactly once by the consumer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Original path, for moves only.
    pub previous_path: Option<PathBuf>,
    pub timestamp: SystemTime,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(kind: ChangeKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            previous_path: None,
            timestamp: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn moved(from: PathBuf, to: PathBuf) -> Self {
        Self {
            kind: ChangeKind::Moved,
            path: to,
            previous_path: Some(from),
            timestamp: SystemTime::now(),
        }
    }
}

/// Counters exposed for status displays and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub running: bool,
    pub watched_paths: usize,
    pub queue_depth: usize,
    pub fingerprints: usize,
    pub queued: u64,
    pub processed: u64,
    pub skipped_unchanged: u64,
    pub dropped: u64,
    pub errors: u64,
    pub created: u64,
    pub modified: u64,
    pub deleted: u64,
    pub moved: u64,
}

/// Stores the change detector applies events to.
#[derive(Clone)]
pub struct DetectorCollaborators {
    pub extractor: Arc<dyn Extractor>,
    pub index: Arc<dyn IndexStorage>,
    pub embeddings: Arc<dyn EmbeddingStore>,
    pub registry: Arc<FileTypeRegistry>,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    processed: AtomicU64,
    skipped_unchanged: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    created: AtomicU64,
    modified: AtomicU64,
    deleted: AtomicU64,
    moved: AtomicU64,
}

struct Shared {
    config: DetectorConfig,
    collaborators: DetectorCollaborators,
    watched: Mutex<BTreeSet<PathBuf>>,
    cache: Mutex<FingerprintCache>,
    running: AtomicBool,
    /// Producer side of the queue; present only while running.
    queue_tx: Mutex<Option<Sender<ChangeEvent>>>,
    counters: Counters,
}

struct DetectorRuntime {
    watcher: RecommendedWatcher,
    consumer: std::thread::JoinHandle<()>,
}

/// Watches registered folders and keeps the index in step with the
/// filesystem.
///
/// Start/stop are idempotent pairs; watch paths registered while stopped are
/// picked up on the next start. The fingerprint cache survives restarts via
/// its JSON file under the configured data directory.
pub struct ChangeDetector {
    shared: Arc<Shared>,
    runtime: Mutex<Option<DetectorRuntime>>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(config: DetectorConfig, collaborators: DetectorCollaborators) -> Self {
        let cache = FingerprintCache::load(&FingerprintCache::file_path(&config.data_dir));
        Self {
            shared: Arc::new(Shared {
                config,
                collaborators,
                watched: Mutex::new(BTreeSet::new()),
                cache: Mutex::new(cache),
                running: AtomicBool::new(false),
                queue_tx: Mutex::new(None),
                counters: Counters::default(),
            }),
            runtime: Mutex::new(None),
        }
    }

    /// Start the watcher backend and the consumer thread.
    pub fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock().expect("runtime lock");
        if runtime.is_some() {
            return Err(IndexerError::AlreadyRunning);
        }

        let (tx, rx) = bounded(self.shared.config.queue_capacity);

        let weak = Arc::downgrade(&self.shared);
        let handler_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                let Some(shared) = weak.upgrade() else { return };
                match result {
                    Ok(event) => shared.on_notify(&event, &handler_tx),
                    Err(err) => log::warn!("watcher backend error: {err}"),
                }
            })?;

        for path in self.shared.watched.lock().expect("watched lock").iter() {
            watcher.watch(path, RecursiveMode::Recursive)?;
            log::info!("watching {}", path.display());
        }

        let shared = Arc::clone(&self.shared);
        let consumer = std::thread::Builder::new()
            .name("change-detector".to_string())
            .spawn(move || consumer_loop(&shared, &rx))?;

        // Every fallible step is behind us; only now does the detector
        // become observably running. An early return above leaves it fully
        // stopped and restartable.
        *self.shared.queue_tx.lock().expect("queue lock") = Some(tx);
        self.shared.running.store(true, Ordering::SeqCst);
        *runtime = Some(DetectorRuntime { watcher, consumer });
        log::info!("change detector started");
        Ok(())
    }

    /// Stop watching, drain the consumer, persist fingerprints.
    pub fn stop(&self) -> Result<()> {
        let Some(DetectorRuntime { watcher, consumer }) =
            self.runtime.lock().expect("runtime lock").take()
        else {
            return Err(IndexerError::NotRunning);
        };

        self.shared.running.store(false, Ordering::SeqCst);
        // Dropping the producer lets the consumer drain the queue and exit
        // on disconnect instead of waiting out a poll timeout.
        self.shared.queue_tx.lock().expect("queue lock").take();
        drop(watcher);

        if consumer.join().is_err() {
            log::error!("change detector consumer thread panicked");
        }

        self.persist_fingerprints()?;
        log::info!("change detector stopped");
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Register a folder for monitoring. Live-watches immediately when
    /// running; otherwise the folder is picked up on the next start.
    pub fn add_watch_path(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(IndexerError::WatchPathMissing(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(IndexerError::WatchPathNotDirectory(path.to_path_buf()));
        }

        let newly_added = self
            .shared
            .watched
            .lock()
            .expect("watched lock")
            .insert(path.to_path_buf());
        if !newly_added {
            log::debug!("{} is already registered for watching", path.display());
            return Ok(());
        }

        if let Some(runtime) = self.runtime.lock().expect("runtime lock").as_mut() {
            runtime.watcher.watch(path, RecursiveMode::Recursive)?;
        }
        log::info!("registered watch path {}", path.display());
        Ok(())
    }

    /// Unregister a folder. Returns false when it was not registered.
    pub fn remove_watch_path(&self, path: &Path) -> Result<bool> {
        let removed = self
            .shared
            .watched
            .lock()
            .expect("watched lock")
            .remove(path);
        if !removed {
            return Ok(false);
        }

        if let Some(runtime) = self.runtime.lock().expect("runtime lock").as_mut() {
            runtime.watcher.unwatch(path)?;
        }
        log::info!("unregistered watch path {}", path.display());
        Ok(true)
    }

    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.shared
            .watched
            .lock()
            .expect("watched lock")
            .iter()
            .cloned()
            .collect()
    }

    /// Re-process every supported file under `folder` regardless of
    /// fingerprints. Synthetic change events go through the normal queue, so
    /// ordering relative to live events is preserved.
    ///
    /// Blocks while the queue is full rather than dropping rescans.
    pub fn force_rescan(&self, folder: &Path) -> Result<usize> {
        if !self.is_running() {
            return Err(IndexerError::NotRunning);
        }
        if !folder.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "not a directory: {}",
                folder.display()
            )));
        }

        let tx = self
            .shared
            .queue_tx
            .lock()
            .expect("queue lock")
            .clone()
            .ok_or(IndexerError::QueueClosed)?;

        let mut enqueued = 0usize;
        for entry in WalkDir::new(folder)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.shared.should_process(path) {
                continue;
            }
            self.shared.cache.lock().expect("cache lock").evict(path);
            tx.send(ChangeEvent::new(ChangeKind::Modified, path.to_path_buf()))
                .map_err(|_| IndexerError::QueueClosed)?;
            self.shared.counters.queued.fetch_add(1, Ordering::Relaxed);
            enqueued += 1;
        }

        log::info!("force rescan of {} queued {enqueued} files", folder.display());
        Ok(enqueued)
    }

    /// Re-process every watched folder. See [`ChangeDetector::force_rescan`].
    pub fn force_rescan_all(&self) -> Result<usize> {
        let mut enqueued = 0usize;
        for folder in self.watched_paths() {
            enqueued += self.force_rescan(&folder)?;
        }
        Ok(enqueued)
    }

    /// Forget all fingerprints and persist the empty cache; every watched
    /// file is treated as changed on its next notification.
    pub fn clear_fingerprints(&self) -> Result<()> {
        self.shared.cache.lock().expect("cache lock").clear();
        self.persist_fingerprints()
    }

    /// Persist the fingerprint cache now, outside the periodic schedule.
    pub fn persist_fingerprints(&self) -> Result<()> {
        let path = FingerprintCache::file_path(&self.shared.config.data_dir);
        self.shared.cache.lock().expect("cache lock").save(&path)
    }

    #[must_use]
    pub fn stats(&self) -> DetectorStats {
        let counters = &self.shared.counters;
        DetectorStats {
            running: self.is_running(),
            watched_paths: self.shared.watched.lock().expect("watched lock").len(),
            queue_depth: self
                .shared
                .queue_tx
                .lock()
                .expect("queue lock")
                .as_ref()
                .map_or(0, Sender::len),
            fingerprints: self.shared.cache.lock().expect("cache lock").len(),
            queued: counters.queued.load(Ordering::Relaxed),
            processed: counters.processed.load(Ordering::Relaxed),
            skipped_unchanged: counters.skipped_unchanged.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            errors: counters.errors.load(Ordering::Relaxed),
            created: counters.created.load(Ordering::Relaxed),
            modified: counters.modified.load(Ordering::Relaxed),
            deleted: counters.deleted.load(Ordering::Relaxed),
            moved: counters.moved.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        let running = self
            .runtime
            .lock()
            .map_or(false, |runtime| runtime.is_some());
        if running {
            if let Err(err) = self.stop() {
                log::warn!("change detector drop: {err}");
            }
        }
    }
}

impl Shared {
    /// Translate one backend notification into queue events.
    ///
    /// Runs on the watcher backend's thread. Dedup happens here so an
    /// editor's save-storm collapses before it ever reaches the queue.
    fn on_notify(&self, event: &notify::Event, tx: &Sender<ChangeEvent>) {
        match &event.kind {
            EventKind::Create(_) => {
                for path in &event.paths {
                    self.enqueue_upsert(path, tx, ChangeKind::Created);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to] = event.paths.as_slice() {
                    match (self.should_process(from), self.should_process(to)) {
                        (true, true) => {
                            self.enqueue(ChangeEvent::moved(from.clone(), to.clone()), tx);
                        }
                        // Renamed into or out of relevance, e.g. atomic
                        // saves going .tmp -> .docx.
                        (false, true) => {
                            self.enqueue(ChangeEvent::new(ChangeKind::Created, to.clone()), tx);
                        }
                        (true, false) => {
                            self.enqueue(ChangeEvent::new(ChangeKind::Deleted, from.clone()), tx);
                        }
                        (false, false) => {}
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    if self.should_process(path) {
                        self.enqueue(ChangeEvent::new(ChangeKind::Deleted, path.clone()), tx);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in &event.paths {
                    self.enqueue_upsert(path, tx, ChangeKind::Created);
                }
            }
            EventKind::Modify(_) => {
                for path in &event.paths {
                    self.enqueue_upsert(path, tx, ChangeKind::Modified);
                }
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    if self.should_process(path) {
                        self.enqueue(ChangeEvent::new(ChangeKind::Deleted, path.clone()), tx);
                    }
                }
            }
            _ => {}
        }
    }

    /// Filter + dedup + enqueue for created/modified paths.
    fn enqueue_upsert(&self, path: &Path, tx: &Sender<ChangeEvent>, kind: ChangeKind) {
        if !self.should_process(path) {
            return;
        }
        if kind == ChangeKind::Modified {
            let verdict = self.cache.lock().expect("cache lock").check(path);
            if verdict == FileChange::Unchanged {
                self.counters
                    .skipped_unchanged
                    .fetch_add(1, Ordering::Relaxed);
                log::debug!("skipping {}: content unchanged", path.display());
                return;
            }
        }
        self.enqueue(ChangeEvent::new(kind, path.to_path_buf()), tx);
    }

    fn enqueue(&self, event: ChangeEvent, tx: &Sender<ChangeEvent>) {
        match tx.try_send(event) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(crossbeam_channel::TrySendError::Full(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("change queue full; dropping {event:?}");
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {}
        }
    }

    /// Is this path worth indexing at all?
    ///
    /// Works purely on the name so it also applies to already-deleted files.
    fn should_process(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return false;
        };
        if name.starts_with('.') || name.starts_with('~') {
            return false;
        }
        if EXCLUDED_NAMES.iter().any(|junk| name.eq_ignore_ascii_case(junk)) {
            return false;
        }
        let lowered = name.to_lowercase();
        if EXCLUDED_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix)) {
            return false;
        }
        self.collaborators.registry.is_supported(path)
    }

    fn handle_event(&self, event: &ChangeEvent) {
        log::debug!("processing change: {event:?}");
        let result = match event.kind {
            ChangeKind::Created | ChangeKind::Modified => self.upsert(&event.path),
            ChangeKind::Deleted => self.delete(&event.path),
            ChangeKind::Moved => match &event.previous_path {
                Some(previous) => self
                    .delete(previous)
                    .and_then(|()| self.upsert(&event.path)),
                None => self.upsert(&event.path),
            },
        };

        match result {
            Ok(()) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                let per_kind = match event.kind {
                    ChangeKind::Created => &self.counters.created,
                    ChangeKind::Modified => &self.counters.modified,
                    ChangeKind::Deleted => &self.counters.deleted,
                    ChangeKind::Moved => &self.counters.moved,
                };
                per_kind.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                log::error!("failed to apply {event:?}: {err}");
            }
        }
    }

    /// Extract and (re-)index one file, then record its fingerprint.
    fn upsert(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            // Already gone again; treat as a deletion.
            return self.delete(path);
        }

        let document = self.collaborators.extractor.extract(path)?;
        if self.collaborators.index.document_exists(&document.id)? {
            self.collaborators.index.update_document(&document)?;
        } else {
            self.collaborators.index.add_document(&document)?;
        }
        self.collaborators
            .embeddings
            .add_document_embedding(&document.id, &document.content)?;

        self.cache.lock().expect("cache lock").check(path);
        log::info!("index updated for {}", path.display());
        Ok(())
    }

    /// Remove a file from both stores by its path-derived id.
    fn delete(&self, path: &Path) -> Result<()> {
        let id = DocumentId::from_path(path);
        self.collaborators.index.remove_document(&id)?;
        self.collaborators.embeddings.remove_document_embedding(&id)?;
        self.cache.lock().expect("cache lock").evict(path);
        log::info!("index entry removed for {}", path.display());
        Ok(())
    }
}

/// Single consumer: drains the queue, applies changes, persists fingerprints
/// on a fixed interval. Exits when the producer side is dropped, after
/// draining whatever is still queued.
fn consumer_loop(shared: &Arc<Shared>, rx: &Receiver<ChangeEvent>) {
    log::debug!("change detector consumer started");
    let cache_path = FingerprintCache::file_path(&shared.config.data_dir);
    let mut last_persist = Instant::now();

    loop {
        match rx.recv_timeout(shared.config.poll_timeout) {
            Ok(event) => shared.handle_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_persist.elapsed() >= shared.config.persist_interval {
            if let Err(err) = shared.cache.lock().expect("cache lock").save(&cache_path) {
                log::warn!("periodic fingerprint save failed: {err}");
            }
            last_persist = Instant::now();
        }
    }

    if let Err(err) = shared.cache.lock().expect("cache lock").save(&cache_path) {
        log::warn!("final fingerprint save failed: {err}");
    }
    log::debug!("change detector consumer exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfinder_pipeline::memory::{MemoryEmbeddings, MemoryIndex, TextExtractor};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        detector: ChangeDetector,
        index: Arc<MemoryIndex>,
        embeddings: Arc<MemoryEmbeddings>,
        _data_dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let data_dir = tempfile::tempdir().unwrap();
        let index = Arc::new(MemoryIndex::new());
        let embeddings = Arc::new(MemoryEmbeddings::new());
        let mut config = DetectorConfig::new(data_dir.path());
        config.poll_timeout = Duration::from_millis(20);
        let detector = ChangeDetector::new(
            config,
            DetectorCollaborators {
                extractor: Arc::new(TextExtractor::new()),
                index: Arc::clone(&index) as Arc<dyn IndexStorage>,
                embeddings: Arc::clone(&embeddings) as Arc<dyn EmbeddingStore>,
                registry: Arc::new(FileTypeRegistry::default()),
            },
        );
        Fixture {
            detector,
            index,
            embeddings,
            _data_dir: data_dir,
        }
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn start_stop_are_paired() {
        let fixture = fixture();
        assert!(!fixture.detector.is_running());
        assert!(matches!(
            fixture.detector.stop(),
            Err(IndexerError::NotRunning)
        ));

        fixture.detector.start().unwrap();
        assert!(fixture.detector.is_running());
        assert!(fixture.detector.stats().running);
        assert!(matches!(
            fixture.detector.start(),
            Err(IndexerError::AlreadyRunning)
        ));

        fixture.detector.stop().unwrap();
        assert!(!fixture.detector.is_running());
    }

    #[test]
    fn failed_start_leaves_the_detector_stopped() {
        let fixture = fixture();
        let dir = tempfile::tempdir().unwrap();
        let doomed = dir.path().join("watched");
        std::fs::create_dir(&doomed).unwrap();
        fixture.detector.add_watch_path(&doomed).unwrap();

        // The registered directory disappears before start.
        std::fs::remove_dir(&doomed).unwrap();
        assert!(fixture.detector.start().is_err());

        assert!(!fixture.detector.is_running());
        assert!(!fixture.detector.stats().running);
        assert!(matches!(
            fixture.detector.stop(),
            Err(IndexerError::NotRunning)
        ));
        assert!(matches!(
            fixture.detector.force_rescan(dir.path()),
            Err(IndexerError::NotRunning)
        ));

        // Dropping the vanished path makes the detector startable again.
        assert!(fixture.detector.remove_watch_path(&doomed).unwrap());
        fixture.detector.start().unwrap();
        assert!(fixture.detector.is_running());
        fixture.detector.stop().unwrap();
    }

    #[test]
    fn watch_path_must_be_an_existing_directory() {
        let fixture = fixture();
        assert!(matches!(
            fixture.detector.add_watch_path(Path::new("/nonexistent/abc")),
            Err(IndexerError::WatchPathMissing(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();
        assert!(matches!(
            fixture.detector.add_watch_path(&file),
            Err(IndexerError::WatchPathNotDirectory(_))
        ));

        fixture.detector.add_watch_path(dir.path()).unwrap();
        // Idempotent.
        fixture.detector.add_watch_path(dir.path()).unwrap();
        assert_eq!(
            fixture.detector.watched_paths(),
            vec![dir.path().to_path_buf()]
        );

        assert!(fixture.detector.remove_watch_path(dir.path()).unwrap());
        assert!(!fixture.detector.remove_watch_path(dir.path()).unwrap());
    }

    #[test]
    fn created_file_is_indexed() {
        let fixture = fixture();
        let dir = tempfile::tempdir().unwrap();
        fixture.detector.add_watch_path(dir.path()).unwrap();
        fixture.detector.start().unwrap();

        let file = dir.path().join("note.txt");
        std::fs::write(&file, "hello").unwrap();

        let index = Arc::clone(&fixture.index);
        assert!(wait_until(Duration::from_secs(10), || index.len() == 1));
        let id = DocumentId::from_path(&file);
        assert!(fixture.embeddings.contains(&id));

        fixture.detector.stop().unwrap();
    }

    #[test]
    fn deleted_file_is_removed_from_both_stores() {
        let fixture = fixture();
        let dir = tempfile::tempdir().unwrap();
        fixture.detector.add_watch_path(dir.path()).unwrap();
        fixture.detector.start().unwrap();

        let file = dir.path().join("note.txt");
        std::fs::write(&file, "hello").unwrap();
        let index = Arc::clone(&fixture.index);
        assert!(wait_until(Duration::from_secs(10), || index.len() == 1));

        std::fs::remove_file(&file).unwrap();
        assert!(wait_until(Duration::from_secs(10), || index.len() == 0));
        assert!(!fixture.embeddings.contains(&DocumentId::from_path(&file)));
        assert!(fixture.detector.stats().deleted >= 1);

        fixture.detector.stop().unwrap();
    }

    #[test]
    fn unsupported_and_junk_files_are_ignored() {
        let fixture = fixture();
        let shared = &fixture.detector.shared;

        assert!(shared.should_process(Path::new("/w/report.docx")));
        assert!(shared.should_process(Path::new("/w/notes.md")));
        assert!(!shared.should_process(Path::new("/w/video.mp4")));
        assert!(!shared.should_process(Path::new("/w/.hidden.txt")));
        assert!(!shared.should_process(Path::new("/w/~$report.docx")));
        assert!(!shared.should_process(Path::new("/w/save.txt.tmp")));
        assert!(!shared.should_process(Path::new("/w/Thumbs.db")));
    }

    #[test]
    fn moved_event_reindexes_under_the_new_path() {
        let fixture = fixture();
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.txt");
        let new = dir.path().join("new.txt");
        std::fs::write(&new, "moved body").unwrap();

        fixture
            .detector
            .shared
            .handle_event(&ChangeEvent::moved(old.clone(), new.clone()));

        assert!(fixture.index.get(&DocumentId::from_path(&new)).is_some());
        assert!(fixture.index.get(&DocumentId::from_path(&old)).is_none());
    }

    #[test]
    fn force_rescan_requires_running() {
        let fixture = fixture();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            fixture.detector.force_rescan(dir.path()),
            Err(IndexerError::NotRunning)
        ));
    }

    #[test]
    fn force_rescan_reprocesses_unchanged_files() {
        let fixture = fixture();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "stable").unwrap();

        fixture.detector.start().unwrap();

        let queued = fixture.detector.force_rescan(dir.path()).unwrap();
        assert_eq!(queued, 1);
        let index = Arc::clone(&fixture.index);
        assert!(wait_until(Duration::from_secs(10), || index.len() == 1));

        // Fingerprints were evicted, so a second rescan processes it again.
        let queued = fixture.detector.force_rescan(dir.path()).unwrap();
        assert_eq!(queued, 1);
        assert!(wait_until(Duration::from_secs(10), || {
            fixture.detector.stats().processed >= 2
        }));

        fixture.detector.stop().unwrap();
    }

    #[test]
    fn force_rescan_all_covers_every_watched_folder() {
        let fixture = fixture();
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        std::fs::write(dir_a.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir_b.path().join("b.txt"), "b").unwrap();

        fixture.detector.add_watch_path(dir_a.path()).unwrap();
        fixture.detector.add_watch_path(dir_b.path()).unwrap();
        fixture.detector.start().unwrap();

        assert_eq!(fixture.detector.force_rescan_all().unwrap(), 2);
        let index = Arc::clone(&fixture.index);
        assert!(wait_until(Duration::from_secs(10), || index.len() == 2));

        fixture.detector.stop().unwrap();
    }

    #[test]
    fn fingerprints_survive_stop_and_are_clearable() {
        let data_dir = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "stable").unwrap();

        let make = || {
            let mut config = DetectorConfig::new(data_dir.path());
            config.poll_timeout = Duration::from_millis(20);
            ChangeDetector::new(
                config,
                DetectorCollaborators {
                    extractor: Arc::new(TextExtractor::new()),
                    index: Arc::new(MemoryIndex::new()),
                    embeddings: Arc::new(MemoryEmbeddings::new()),
                    registry: Arc::new(FileTypeRegistry::default()),
                },
            )
        };

        let detector = make();
        detector.start().unwrap();
        detector.force_rescan(dir.path()).unwrap();
        assert!(wait_until(Duration::from_secs(10), || {
            detector.stats().processed >= 1
        }));
        detector.stop().unwrap();

        // A fresh detector over the same data dir sees the saved fingerprints.
        let reloaded = make();
        assert_eq!(reloaded.stats().fingerprints, 1);

        reloaded.clear_fingerprints().unwrap();
        assert_eq!(reloaded.stats().fingerprints, 0);
        let again = make();
        assert_eq!(again.stats().fingerprints, 0);
    }
}
