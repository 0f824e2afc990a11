use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Terminal summary of one folder indexing job.
///
/// Produced once at completion and handed to the caller inside the
/// job-completed event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingStatistics {
    pub folder_path: PathBuf,
    pub total_files_found: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub documents_added: usize,
    pub elapsed: Duration,
    pub errors: Vec<String>,
}

impl IndexingStatistics {
    #[must_use]
    pub fn new(folder_path: PathBuf) -> Self {
        Self {
            folder_path,
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, path: &std::path::Path, error: impl std::fmt::Display) {
        self.files_failed += 1;
        self.errors.push(format!("{}: {error}", path.display()));
    }
}
