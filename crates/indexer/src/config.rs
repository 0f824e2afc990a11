use std::path::PathBuf;
use std::time::Duration;

/// Tuning knobs for the [`crate::JobOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ceiling on simultaneously active jobs.
    pub max_concurrent_jobs: usize,
    /// How long a forced cancel waits for cooperative shutdown before
    /// abandoning the execution thread.
    pub grace_period: Duration,
    /// Interval of the periodic cleanup pass.
    pub cleanup_interval: Duration,
    /// Jobs active longer than this are logged by the cleanup pass.
    pub long_running_warning: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            grace_period: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(30),
            long_running_warning: Duration::from_secs(3600),
            event_capacity: 256,
        }
    }
}

/// Tuning knobs for the [`crate::ChangeDetector`].
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Directory holding the persisted fingerprint cache.
    pub data_dir: PathBuf,
    /// Bound of the internal event queue.
    pub queue_capacity: usize,
    /// How long the consumer loop blocks on the queue per iteration; an upper
    /// bound on stop-request latency.
    pub poll_timeout: Duration,
    /// Interval between periodic fingerprint-cache saves.
    pub persist_interval: Duration,
}

impl DetectorConfig {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            queue_capacity: 1024,
            poll_timeout: Duration::from_secs(1),
            persist_interval: Duration::from_secs(60),
        }
    }
}
