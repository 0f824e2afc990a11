use crate::config::OrchestratorConfig;
use crate::events::{IndexingEvent, JobId};
use crate::executor::JobExecutor;
use crate::job::{IndexingJob, JobCollaborators};
use crate::stats::IndexingStatistics;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

/// Lifecycle state of one job record.
///
/// ```text
/// Starting ──> Running ──> Stopping ──> Finished ─┐
///     │           │            │                  ├──> Cleanup ──> removed
///     └───────────┴──> Error ──┴──────────────────┘
/// ```
///
/// A forcibly stopped job lands in `Finished` with a "forced stop" error
/// annotation, not in `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Starting,
    Running,
    Stopping,
    Finished,
    Error,
    Cleanup,
}

impl JobState {
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Terminal: no further automatic transition without external action.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

/// Result of a submission attempt. Refusals are ordinary values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(JobId),
    AtCapacity { active: usize, ceiling: usize },
    AlreadyIndexing { folder: PathBuf },
    ShuttingDown,
}

impl SubmitOutcome {
    #[must_use]
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Accepted(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Read-only view of one job for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    pub job_id: JobId,
    pub folder: PathBuf,
    pub state: JobState,
    pub duration: Duration,
    pub last_error: Option<String>,
}

/// Point-in-time snapshot of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub max_concurrent: usize,
    pub can_accept_more: bool,
    pub state_counts: HashMap<JobState, usize>,
    pub jobs: Vec<JobDetail>,
}

struct JobRecord {
    id: JobId,
    folder: PathBuf,
    state: JobState,
    started_at: Instant,
    ended_at: Option<Instant>,
    last_error: Option<String>,
    stop: Arc<AtomicBool>,
    state_tx: watch::Sender<JobState>,
    cleanup_callbacks: Vec<Box<dyn FnOnce() + Send>>,
}

impl JobRecord {
    fn duration(&self) -> Duration {
        self.ended_at.unwrap_or_else(Instant::now) - self.started_at
    }

    fn set_state(&mut self, state: JobState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

/// Accepts folder-indexing requests, enforces the concurrency ceiling,
/// tracks each job through its lifecycle, relays events, and reclaims
/// finished-job resources.
///
/// Must be constructed inside a Tokio runtime (the periodic cleanup task and
/// the bounded cancellation waits run on it). Job bodies themselves run on
/// whatever the injected [`JobExecutor`] provides.
pub struct JobOrchestrator {
    inner: Arc<Inner>,
    cleanup_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct Inner {
    config: OrchestratorConfig,
    executor: Arc<dyn JobExecutor>,
    // Single non-reentrant mutex guarding all bookkeeping. Code already
    // holding it must use the *_locked helpers, never the public accessors.
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    events: broadcast::Sender<IndexingEvent>,
    next_job_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl JobOrchestrator {
    #[must_use]
    pub fn new(config: OrchestratorConfig, executor: Arc<dyn JobExecutor>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let inner = Arc::new(Inner {
            config,
            executor,
            jobs: Mutex::new(HashMap::new()),
            events,
            next_job_id: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        });

        let cleanup_task = spawn_cleanup_task(&inner);
        log::info!(
            "orchestrator ready (max concurrent jobs: {})",
            inner.config.max_concurrent_jobs
        );

        Self {
            inner,
            cleanup_task: Mutex::new(Some(cleanup_task)),
        }
    }

    /// Subscribe to the notification stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IndexingEvent> {
        self.inner.events.subscribe()
    }

    /// Request indexing of `folder`.
    ///
    /// Refused (synchronously, without error) when the ceiling is reached or
    /// the folder already has an active job.
    pub fn submit(&self, folder: impl AsRef<Path>, collaborators: &JobCollaborators) -> SubmitOutcome {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return SubmitOutcome::ShuttingDown;
        }
        let folder = folder.as_ref().to_path_buf();

        let (job_id, stop) = {
            let mut jobs = self.inner.jobs.lock().expect("jobs lock");

            let active = active_count_locked(&jobs);
            if active >= self.inner.config.max_concurrent_jobs {
                log::warn!(
                    "refusing {}: at capacity ({active}/{})",
                    folder.display(),
                    self.inner.config.max_concurrent_jobs
                );
                return SubmitOutcome::AtCapacity {
                    active,
                    ceiling: self.inner.config.max_concurrent_jobs,
                };
            }

            if jobs
                .values()
                .any(|record| record.state.is_active() && record.folder == folder)
            {
                log::warn!("refusing {}: already being indexed", folder.display());
                return SubmitOutcome::AlreadyIndexing { folder };
            }

            let job_id = JobId(self.inner.next_job_id.fetch_add(1, Ordering::SeqCst) + 1);
            let stop = Arc::new(AtomicBool::new(false));
            let (state_tx, _) = watch::channel(JobState::Starting);
            jobs.insert(
                job_id,
                JobRecord {
                    id: job_id,
                    folder: folder.clone(),
                    state: JobState::Starting,
                    started_at: Instant::now(),
                    ended_at: None,
                    last_error: None,
                    stop: Arc::clone(&stop),
                    state_tx,
                    cleanup_callbacks: Vec::new(),
                },
            );
            (job_id, stop)
        };

        let job = IndexingJob::new(
            job_id,
            folder.clone(),
            collaborators.clone(),
            self.inner.events.clone(),
            stop,
        );

        let inner = Arc::clone(&self.inner);
        let body = Box::new(move || {
            inner.mark_running(job_id);
            // Panic boundary: a work-unit failure must never escape the
            // execution thread.
            match catch_unwind(AssertUnwindSafe(|| job.run())) {
                Ok(Ok(stats)) => inner.complete_job(job_id, Ok(stats)),
                Ok(Err(err)) => inner.complete_job(
                    job_id,
                    Err(("folder_processing".to_string(), err.to_string())),
                ),
                Err(payload) => inner.complete_job(
                    job_id,
                    Err(("panic".to_string(), panic_message(payload.as_ref()))),
                ),
            }
        });

        self.inner.emit(IndexingEvent::JobStarted {
            job_id,
            folder: folder.clone(),
        });

        if let Err(err) = self.inner.executor.execute(format!("indexing-{job_id}"), body) {
            log::error!("failed to start execution for {job_id}: {err}");
            self.inner
                .complete_job(job_id, Err(("spawn".to_string(), err.to_string())));
        }

        self.inner.emit_status();
        log::info!("submitted {job_id} for {}", folder.display());
        SubmitOutcome::Accepted(job_id)
    }

    /// Stop one job. Returns false for unknown or already-terminal jobs.
    ///
    /// Without `force` this only requests cooperative cancellation. With
    /// `force` it waits up to the configured grace period, then abandons the
    /// execution thread and marks the record `Finished` with a "forced stop"
    /// annotation.
    pub async fn cancel(&self, job_id: JobId, force: bool) -> bool {
        let mut state_rx = {
            let mut jobs = self.inner.jobs.lock().expect("jobs lock");
            let Some(record) = jobs.get_mut(&job_id) else {
                log::warn!("cancel: unknown job {job_id}");
                return false;
            };
            if !record.state.is_active() {
                log::warn!("cancel: {job_id} is not active ({:?})", record.state);
                return false;
            }
            record.set_state(JobState::Stopping);
            record.stop.store(true, Ordering::Relaxed);
            record.state_tx.subscribe()
        };

        log::info!("stopping {job_id} (force: {force})");

        if force {
            let waited = tokio::time::timeout(self.inner.config.grace_period, async {
                loop {
                    if state_rx.borrow_and_update().is_terminal() {
                        break;
                    }
                    if state_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;

            if waited.is_err() && self.inner.force_finish(job_id) {
                log::warn!("{job_id} ignored the stop request; record forced to finished");
            }
        }

        self.inner.emit_status();
        true
    }

    /// Stop every active job. Stop flags are raised for all jobs before any
    /// grace wait so forced cancellations share one deadline.
    pub async fn cancel_all(&self, force: bool) -> usize {
        let targets: Vec<(JobId, watch::Receiver<JobState>)> = {
            let mut jobs = self.inner.jobs.lock().expect("jobs lock");
            jobs.values_mut()
                .filter(|record| record.state.is_active())
                .map(|record| {
                    record.set_state(JobState::Stopping);
                    record.stop.store(true, Ordering::Relaxed);
                    (record.id, record.state_tx.subscribe())
                })
                .collect()
        };

        let count = targets.len();
        if count == 0 {
            return 0;
        }
        log::info!("stopping {count} jobs (force: {force})");

        if force {
            let deadline = tokio::time::Instant::now() + self.inner.config.grace_period;
            for (job_id, mut state_rx) in targets {
                let waited = tokio::time::timeout_at(deadline, async {
                    loop {
                        if state_rx.borrow_and_update().is_terminal() {
                            break;
                        }
                        if state_rx.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await;

                if waited.is_err() && self.inner.force_finish(job_id) {
                    log::warn!("{job_id} ignored the stop request; record forced to finished");
                }
            }
        }

        self.inner.emit_status();
        count
    }

    /// Reclaim every terminal job: run its cleanup callbacks, then remove
    /// the record. Safe to call concurrently with `submit`.
    pub fn cleanup_finished(&self) -> usize {
        self.inner.cleanup_finished()
    }

    /// Attach a callback to run when the job's record is cleaned up.
    pub fn register_cleanup(
        &self,
        job_id: JobId,
        callback: impl FnOnce() + Send + 'static,
    ) -> bool {
        let mut jobs = self.inner.jobs.lock().expect("jobs lock");
        match jobs.get_mut(&job_id) {
            Some(record) if record.state != JobState::Cleanup => {
                record.cleanup_callbacks.push(Box::new(callback));
                true
            }
            _ => false,
        }
    }

    /// Read-only snapshot of all bookkeeping.
    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        let jobs = self.inner.jobs.lock().expect("jobs lock");

        // Derived values are recomputed inline: the public accessors would
        // re-enter the lock this thread already holds.
        let mut state_counts: HashMap<JobState, usize> = HashMap::new();
        let mut active_jobs = 0;
        for record in jobs.values() {
            *state_counts.entry(record.state).or_insert(0) += 1;
            if record.state.is_active() {
                active_jobs += 1;
            }
        }

        StatusSummary {
            total_jobs: jobs.len(),
            active_jobs,
            max_concurrent: self.inner.config.max_concurrent_jobs,
            can_accept_more: active_jobs < self.inner.config.max_concurrent_jobs,
            state_counts,
            jobs: jobs
                .values()
                .map(|record| JobDetail {
                    job_id: record.id,
                    folder: record.folder.clone(),
                    state: record.state,
                    duration: record.duration(),
                    last_error: record.last_error.clone(),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn active_job_count(&self) -> usize {
        let jobs = self.inner.jobs.lock().expect("jobs lock");
        active_count_locked(&jobs)
    }

    #[must_use]
    pub fn can_accept_more(&self) -> bool {
        self.active_job_count() < self.inner.config.max_concurrent_jobs
    }

    #[must_use]
    pub fn job_state(&self, job_id: JobId) -> Option<JobState> {
        let jobs = self.inner.jobs.lock().expect("jobs lock");
        jobs.get(&job_id).map(|record| record.state)
    }

    /// Stop the periodic cleanup, force-cancel everything, wait briefly for
    /// abandoned threads to notice their stop flags, final cleanup pass.
    pub async fn shutdown(&self) {
        log::info!("orchestrator shutting down");
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        if let Some(task) = self.cleanup_task.lock().expect("cleanup task lock").take() {
            task.abort();
        }

        let stopped = self.cancel_all(true).await;
        if stopped > 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let cleaned = self.cleanup_finished();

        log::info!("orchestrator shutdown complete (stopped: {stopped}, cleaned: {cleaned})");
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        if let Ok(mut task) = self.cleanup_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

impl Inner {
    fn mark_running(&self, job_id: JobId) {
        let mut jobs = self.jobs.lock().expect("jobs lock");
        if let Some(record) = jobs.get_mut(&job_id) {
            if record.state == JobState::Starting {
                record.set_state(JobState::Running);
            }
        }
    }

    /// Record a job outcome arriving from its execution thread.
    ///
    /// A record that was already forced to a terminal state (or is under
    /// cleanup, or was removed) ignores the late outcome.
    fn complete_job(
        &self,
        job_id: JobId,
        outcome: std::result::Result<IndexingStatistics, (String, String)>,
    ) {
        let event = {
            let mut jobs = self.jobs.lock().expect("jobs lock");
            let Some(record) = jobs.get_mut(&job_id) else {
                log::debug!("outcome for {job_id} arrived after cleanup; dropping");
                return;
            };
            if record.state.is_terminal() || record.state == JobState::Cleanup {
                log::debug!("outcome for {job_id} arrived after forced stop; dropping");
                return;
            }

            record.ended_at = Some(Instant::now());
            match outcome {
                Ok(stats) => {
                    record.set_state(JobState::Finished);
                    log::info!(
                        "{job_id} finished in {:.2}s",
                        record.duration().as_secs_f64()
                    );
                    IndexingEvent::JobCompleted {
                        job_id,
                        folder: record.folder.clone(),
                        stats,
                    }
                }
                Err((context, message)) => {
                    record.last_error = Some(format!("{context}: {message}"));
                    record.set_state(JobState::Error);
                    log::error!("{job_id} failed: {context}: {message}");
                    IndexingEvent::JobError {
                        job_id,
                        context,
                        message,
                    }
                }
            }
        };

        self.emit(event);
        self.emit_status();
    }

    /// Terminal transition for a job whose thread ignored the grace period.
    /// The thread itself is abandoned; it will observe its stop flag at the
    /// next cooperative checkpoint.
    fn force_finish(&self, job_id: JobId) -> bool {
        let mut jobs = self.jobs.lock().expect("jobs lock");
        let Some(record) = jobs.get_mut(&job_id) else {
            return false;
        };
        if record.state.is_terminal() || record.state == JobState::Cleanup {
            return false;
        }
        record.ended_at = Some(Instant::now());
        record.last_error = Some("forced stop".to_string());
        record.set_state(JobState::Finished);
        true
    }

    fn cleanup_finished(&self) -> usize {
        type Callbacks = Vec<Box<dyn FnOnce() + Send>>;
        let targets: Vec<(JobId, Callbacks)> = {
            let mut jobs = self.jobs.lock().expect("jobs lock");
            jobs.values_mut()
                .filter(|record| record.state.is_terminal())
                .map(|record| {
                    record.set_state(JobState::Cleanup);
                    (record.id, std::mem::take(&mut record.cleanup_callbacks))
                })
                .collect()
        };

        let count = targets.len();
        for (job_id, callbacks) in targets {
            for callback in callbacks {
                if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    log::warn!("cleanup callback for {job_id} panicked");
                }
            }
            let mut jobs = self.jobs.lock().expect("jobs lock");
            jobs.remove(&job_id);
            log::debug!("cleaned up {job_id}");
        }

        if count > 0 {
            log::info!("cleaned up {count} finished jobs");
            self.emit_status();
        }
        count
    }

    fn warn_long_running(&self) {
        let threshold = self.config.long_running_warning;
        let jobs = self.jobs.lock().expect("jobs lock");
        for record in jobs.values() {
            if record.state.is_active() && record.duration() > threshold {
                log::warn!(
                    "{} has been active for {:.0}s on {}",
                    record.id,
                    record.duration().as_secs_f64(),
                    record.folder.display()
                );
            }
        }
    }

    fn emit(&self, event: IndexingEvent) {
        let _ = self.events.send(event);
    }

    fn emit_status(&self) {
        let (active, ceiling) = {
            let jobs = self.jobs.lock().expect("jobs lock");
            (active_count_locked(&jobs), self.config.max_concurrent_jobs)
        };
        self.emit(IndexingEvent::StatusChanged { active, ceiling });
    }
}

fn active_count_locked(jobs: &HashMap<JobId, JobRecord>) -> usize {
    jobs.values()
        .filter(|record| record.state.is_active())
        .count()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}

/// Always-present periodic cleanup: reaps terminal records and logs
/// long-running jobs. Holds only a weak reference so dropping the
/// orchestrator stops the task.
fn spawn_cleanup_task(inner: &Arc<Inner>) -> tokio::task::JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let interval = inner.config.cleanup_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await; // first tick is immediate
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else { break };
            if inner.shutting_down.load(Ordering::SeqCst) {
                break;
            }
            let cleaned = inner.cleanup_finished();
            if cleaned > 0 {
                log::debug!("periodic cleanup reaped {cleaned} jobs");
            }
            inner.warn_long_running();
        }
    })
}
