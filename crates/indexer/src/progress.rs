use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stage of a folder indexing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStage {
    Scanning,
    Processing,
    Indexing,
    Watching,
}

/// Point-in-time progress of one job. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: IndexingStage,
    pub current_file: Option<PathBuf>,
    pub processed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(stage: IndexingStage, processed: usize, total: usize) -> Self {
        Self {
            stage,
            current_file: None,
            processed,
            total,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.current_file = Some(file);
        self
    }

    /// Derived completion percentage; 0 when the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.processed * 100) / self.total).min(100) as u8
    }

    /// Human-readable progress line for status displays.
    #[must_use]
    pub fn message(&self) -> String {
        match self.stage {
            IndexingStage::Scanning => {
                if let Some(dir) = &self.current_file {
                    format!(
                        "Scanning {} ({}/{} directories)",
                        dir.display(),
                        self.processed,
                        self.total
                    )
                } else if self.total > 0 {
                    format!("Scanning... ({} files found)", self.total)
                } else {
                    "Scanning...".to_string()
                }
            }
            IndexingStage::Processing => match &self.current_file {
                Some(file) => format!(
                    "Processing {} ({}/{})",
                    shortened_name(file),
                    self.processed,
                    self.total
                ),
                None => format!("Processing files... ({}/{})", self.processed, self.total),
            },
            IndexingStage::Indexing => {
                format!("Updating index... ({} files processed)", self.processed)
            }
            IndexingStage::Watching => "Starting file watching...".to_string(),
        }
    }
}

/// File name clipped to 35 characters, keeping the extension visible.
fn shortened_name(path: &std::path::Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    if name.chars().count() <= 35 {
        return name;
    }

    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stem: String = name.chars().take(30 - ext.chars().count().min(10)).collect();
    format!("{stem}...{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn percentage_is_zero_without_total() {
        let snapshot = ProgressSnapshot::new(IndexingStage::Scanning, 0, 0);
        assert_eq!(snapshot.percentage(), 0);
    }

    #[test]
    fn percentage_is_derived() {
        let snapshot = ProgressSnapshot::new(IndexingStage::Processing, 25, 100);
        assert_eq!(snapshot.percentage(), 25);
        let done = ProgressSnapshot::new(IndexingStage::Processing, 100, 100);
        assert_eq!(done.percentage(), 100);
    }

    #[test]
    fn processing_message_names_the_file() {
        let snapshot = ProgressSnapshot::new(IndexingStage::Processing, 3, 10)
            .with_file(PathBuf::from("/docs/report.pdf"));
        assert_eq!(snapshot.message(), "Processing report.pdf (3/10)");
    }

    #[test]
    fn long_file_names_are_clipped() {
        let long = "a".repeat(60) + ".pdf";
        let name = shortened_name(Path::new(&long));
        assert!(name.chars().count() < 45);
        assert!(name.ends_with(".pdf"));
        assert!(name.contains("..."));
    }
}
