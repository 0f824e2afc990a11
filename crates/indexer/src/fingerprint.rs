use crate::error::Result;
use docfinder_pipeline::hex_encode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const FINGERPRINT_SCHEMA_VERSION: u32 = 1;

const FINGERPRINT_FILE_NAME: &str = "fingerprints.json";
const HASH_BUF_SIZE: usize = 8192;

/// Cached identity of one previously seen file.
///
/// The digest is only trusted while size and mtime still match what was
/// recorded; otherwise the file is re-hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub digest: String,
    pub size_bytes: u64,
    pub modified_unix_ms: u64,
    pub last_processed_unix_ms: u64,
}

/// Outcome of the dedup check for a modified-file notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Unchanged,
    Changed,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    schema_version: u32,
    fingerprints: Vec<FileFingerprint>,
}

/// Path → fingerprint map with atomic JSON persistence.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    entries: HashMap<PathBuf, FileFingerprint>,
}

impl FingerprintCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache file location inside the application data directory.
    #[must_use]
    pub fn file_path(data_dir: &Path) -> PathBuf {
        data_dir.join(FINGERPRINT_FILE_NAME)
    }

    /// Load the persisted cache; a missing, corrupt, or version-mismatched
    /// file yields an empty cache (worst case is re-hashing, never a failure).
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!(
                        "failed to read fingerprint cache {}: {err}",
                        path.display()
                    );
                }
                return Self::new();
            }
        };

        match serde_json::from_slice::<PersistedCache>(&bytes) {
            Ok(persisted) if persisted.schema_version == FINGERPRINT_SCHEMA_VERSION => {
                let entries = persisted
                    .fingerprints
                    .into_iter()
                    .map(|fp| (fp.path.clone(), fp))
                    .collect::<HashMap<_, _>>();
                log::info!("loaded {} fingerprints from {}", entries.len(), path.display());
                Self { entries }
            }
            Ok(persisted) => {
                log::warn!(
                    "fingerprint cache {} has schema {} (want {}); starting empty",
                    path.display(),
                    persisted.schema_version,
                    FINGERPRINT_SCHEMA_VERSION
                );
                Self::new()
            }
            Err(err) => {
                log::warn!(
                    "fingerprint cache {} is corrupt: {err}; starting empty",
                    path.display()
                );
                Self::new()
            }
        }
    }

    /// Persist atomically: write a temp file next to the target, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut fingerprints: Vec<FileFingerprint> = self.entries.values().cloned().collect();
        fingerprints.sort_by(|a, b| a.path.cmp(&b.path));

        let persisted = PersistedCache {
            schema_version: FINGERPRINT_SCHEMA_VERSION,
            fingerprints,
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        log::debug!("saved {} fingerprints to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Dedup check: has this file's content actually changed since the last
    /// time it was processed?
    ///
    /// Cheap path first (size + mtime), content digest second. A hashing
    /// failure falls back to a path+size+mtime digest and reports `Changed` —
    /// fail open rather than silently skipping a possibly-changed file.
    pub fn check(&mut self, path: &Path) -> FileChange {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("cannot stat {} for dedup check: {err}", path.display());
                return FileChange::Changed;
            }
        };
        let size_bytes = metadata.len();
        let modified_unix_ms = modified_unix_ms(&metadata);

        if let Some(cached) = self.entries.get(path) {
            if cached.size_bytes == size_bytes && cached.modified_unix_ms == modified_unix_ms {
                return FileChange::Unchanged;
            }
        }

        let (digest, hash_failed) = match hash_file(path) {
            Ok(digest) => (digest, false),
            Err(err) => {
                log::warn!("failed to hash {}: {err}; treating as changed", path.display());
                (fallback_digest(path, size_bytes, modified_unix_ms), true)
            }
        };

        let unchanged = !hash_failed
            && self
                .entries
                .get(path)
                .is_some_and(|cached| cached.digest == digest);

        self.entries.insert(
            path.to_path_buf(),
            FileFingerprint {
                path: path.to_path_buf(),
                digest,
                size_bytes,
                modified_unix_ms,
                last_processed_unix_ms: unix_now_ms(),
            },
        );

        if unchanged {
            FileChange::Unchanged
        } else {
            FileChange::Changed
        }
    }

    /// Drop the fingerprint for one file, forcing its next check to rehash.
    pub fn evict(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Streaming SHA-256 of the whole file.
fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BUF_SIZE];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex_encode(&hasher.finalize()))
}

/// Digest substitute when the file cannot be read.
fn fallback_digest(path: &Path, size_bytes: u64, modified_unix_ms: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(size_bytes.to_le_bytes());
    hasher.update(modified_unix_ms.to_le_bytes());
    hex_encode(&hasher.finalize())
}

fn modified_unix_ms(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as u64)
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
