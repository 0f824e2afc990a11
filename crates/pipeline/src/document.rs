use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identifier for an indexed document.
///
/// Derived from the absolute file path, so the same file always maps to the
/// same id across restarts, and deletion events can address the index entry
/// without re-reading the (gone) file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        // Lexical normalization only: symlink resolution would give deleted
        // files (which cannot be resolved) a different id than they had while
        // alive.
        let absolute = normalize_lexically(path);
        let mut hasher = Sha256::new();
        hasher.update(absolute.to_string_lossy().as_bytes());
        Self(hex_encode(&hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One extracted document, ready for the index and embedding stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub path: PathBuf,
    pub title: String,
    pub content: String,
    pub size_bytes: u64,
    pub modified_unix_ms: u64,
}

impl Document {
    /// Build a document for `path` with the given extracted text.
    pub fn new(path: &Path, content: String) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified_unix_ms = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis() as u64);

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            id: DocumentId::from_path(path),
            path: path.to_path_buf(),
            title,
            content,
            size_bytes: metadata.len(),
            modified_unix_ms,
        })
    }
}

/// Resolve `.` / `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;

    let base = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_default()
    };

    let mut out = base;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
