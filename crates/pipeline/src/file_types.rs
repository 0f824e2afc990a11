use serde::{Deserialize, Serialize};
use std::path::Path;

/// Document formats the application knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    Word,
    Excel,
    Markdown,
    PlainText,
    RichText,
    OpenDocumentText,
    OpenDocumentSheet,
}

/// Extension → [`FileType`] mapping shared by folder scans and the change
/// detector's event filter.
#[derive(Debug, Clone)]
pub struct FileTypeRegistry {
    entries: Vec<(&'static str, FileType)>,
}

impl Default for FileTypeRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                ("pdf", FileType::Pdf),
                ("docx", FileType::Word),
                ("doc", FileType::Word),
                ("xlsx", FileType::Excel),
                ("xls", FileType::Excel),
                ("md", FileType::Markdown),
                ("txt", FileType::PlainText),
                ("rtf", FileType::RichText),
                ("odt", FileType::OpenDocumentText),
                ("ods", FileType::OpenDocumentSheet),
            ],
        }
    }
}

impl FileTypeRegistry {
    /// Registry restricted to the given extensions (lowercase, no dot).
    #[must_use]
    pub fn with_extensions(extensions: &[&str]) -> Self {
        let all = Self::default();
        Self {
            entries: all
                .entries
                .into_iter()
                .filter(|(ext, _)| extensions.contains(ext))
                .collect(),
        }
    }

    #[must_use]
    pub fn file_type_of(&self, path: &Path) -> Option<FileType> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        self.entries
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, ty)| *ty)
    }

    #[must_use]
    pub fn is_supported(&self, path: &Path) -> bool {
        self.file_type_of(path).is_some()
    }

    /// All supported extensions (lowercase, without the leading dot).
    #[must_use]
    pub fn extensions(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(ext, _)| *ext).collect()
    }
}
