use crate::progress::{IndexingStage, ProgressSnapshot};
use docfinder_pipeline::FileTypeRegistry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Directory-count estimation stops here; pathologically large trees get an
/// open-ended progress total instead of a full pre-walk.
const MAX_DIR_ESTIMATE: usize = 1000;

/// Scanning progress is reported every this many directories.
const PROGRESS_EVERY_DIRS: usize = 5;

/// Recursive walk of one folder, filtered to supported file types.
pub struct FolderScanner {
    root: PathBuf,
    registry: Arc<FileTypeRegistry>,
}

impl FolderScanner {
    #[must_use]
    pub fn new(root: impl AsRef<Path>, registry: Arc<FileTypeRegistry>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            registry,
        }
    }

    /// Walk the folder and collect supported files in discovery order.
    ///
    /// Checks `stop` between filesystem operations; a stopped scan returns
    /// the files found so far. Unreadable entries are logged and skipped.
    pub fn scan(
        &self,
        stop: &AtomicBool,
        mut on_progress: impl FnMut(ProgressSnapshot),
    ) -> Vec<PathBuf> {
        let estimated_dirs = self.estimate_directory_count(stop);

        let mut files = Vec::new();
        let mut scanned_dirs = 0usize;

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            if stop.load(Ordering::Relaxed) {
                log::info!("scan stopped early at {}", self.root.display());
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable entry during scan: {err}");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                scanned_dirs += 1;
                if scanned_dirs % PROGRESS_EVERY_DIRS == 0 || estimated_dirs == 0 {
                    on_progress(
                        ProgressSnapshot::new(
                            IndexingStage::Scanning,
                            scanned_dirs,
                            estimated_dirs.max(scanned_dirs),
                        )
                        .with_file(entry.path().to_path_buf()),
                    );
                }
                continue;
            }

            if entry.file_type().is_file() && self.registry.is_supported(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }

        log::info!(
            "scan of {} found {} supported files in {} directories",
            self.root.display(),
            files.len(),
            scanned_dirs
        );
        on_progress(ProgressSnapshot::new(
            IndexingStage::Scanning,
            files.len(),
            files.len(),
        ));

        files
    }

    /// Cheap pre-walk counting directories, capped at [`MAX_DIR_ESTIMATE`].
    fn estimate_directory_count(&self, stop: &AtomicBool) -> usize {
        let mut total = 0usize;
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if entry.file_type().is_dir() {
                total += 1;
                if total >= MAX_DIR_ESTIMATE {
                    break;
                }
            }
        }
        total
    }
}
