use crate::progress::ProgressSnapshot;
use crate::stats::IndexingStatistics;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of one submitted indexing job. Monotonic, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Notifications emitted by the orchestrator and its jobs.
///
/// Delivered on a `tokio::sync::broadcast` channel; the host bridges them to
/// whatever asynchronous notification mechanism it uses. No UI event loop is
/// assumed. Lagging receivers lose oldest events (broadcast semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexingEvent {
    JobStarted {
        job_id: JobId,
        folder: PathBuf,
    },
    Progress {
        job_id: JobId,
        snapshot: ProgressSnapshot,
    },
    FileProcessed {
        job_id: JobId,
        path: PathBuf,
        success: bool,
        error: Option<String>,
    },
    JobCompleted {
        job_id: JobId,
        folder: PathBuf,
        stats: IndexingStatistics,
    },
    JobError {
        job_id: JobId,
        context: String,
        message: String,
    },
    StatusChanged {
        active: usize,
        ceiling: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = IndexingEvent::JobStarted {
            job_id: JobId(7),
            folder: PathBuf::from("/docs"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "job_started");
        assert_eq!(json["job_id"], 7);
    }

    #[test]
    fn job_id_displays_with_prefix() {
        assert_eq!(JobId(3).to_string(), "job-3");
    }
}
