use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document types the engine knows how to export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Report,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Report => "report",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invoice (identified by number) or a memorized report (identified by
/// name) together with where its export should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    kind: DocumentKind,
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export_file_name: Option<String>,
    export_directory: PathBuf,
}

impl Document {
    pub fn new(kind: DocumentKind, identifier: impl Into<String>, export_directory: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            export_file_name: None,
            export_directory: export_directory.into(),
        }
    }

    pub fn invoice(number: impl Into<String>, export_directory: impl Into<PathBuf>) -> Self {
        Self::new(DocumentKind::Invoice, number, export_directory)
    }

    pub fn report(name: impl Into<String>, export_directory: impl Into<PathBuf>) -> Self {
        Self::new(DocumentKind::Report, name, export_directory)
    }

    /// Export under a different file name than the identifier
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.export_file_name = Some(file_name.into());
        self
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn file_name(&self) -> &str {
        self.export_file_name.as_deref().unwrap_or(&self.identifier)
    }

    pub fn export_directory(&self) -> &Path {
        &self.export_directory
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_directory.join(self.file_name())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.identifier)
    }
}

/// Proof that a document's export file was written and is stable.
///
/// Only the export confirmation step can build one; [`DocumentQueue::complete`]
/// requires it, so a document cannot leave the queue any other way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub identifier: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub replaced_existing: bool,
    pub confirmed_at: DateTime<Utc>,
}

impl ExportRecord {
    pub(crate) fn new(
        document: &Document,
        bytes: u64,
        sha256: String,
        replaced_existing: bool,
    ) -> Self {
        Self {
            identifier: document.identifier().to_string(),
            path: document.export_path(),
            bytes,
            sha256,
            replaced_existing,
            confirmed_at: Utc::now(),
        }
    }
}

/// FIFO of documents awaiting export. The engine always works on the head.
#[derive(Debug, Clone, Default)]
pub struct DocumentQueue {
    items: VecDeque<Document>,
}

impl DocumentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, document: Document) {
        self.items.push_back(document);
    }

    pub fn head(&self) -> Option<&Document> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.items.iter()
    }

    /// Remove the head, provided `record` confirms that very document.
    /// Returns `None` (queue untouched) if the record belongs elsewhere.
    pub fn complete(&mut self, record: &ExportRecord) -> Option<Document> {
        let head = self.items.front()?;
        if head.identifier() == record.identifier && head.export_path() == record.path {
            self.items.pop_front()
        } else {
            None
        }
    }
}

impl FromIterator<Document> for DocumentQueue {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Document>> for DocumentQueue {
    fn from(documents: Vec<Document>) -> Self {
        documents.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_path_defaults_to_identifier() {
        let doc = Document::invoice("12000", "/exports");
        assert_eq!(doc.export_path(), PathBuf::from("/exports/12000"));

        let renamed = Document::report("A/R Aging", "/exports").with_file_name("aging.csv");
        assert_eq!(renamed.export_path(), PathBuf::from("/exports/aging.csv"));
        assert_eq!(renamed.identifier(), "A/R Aging");
    }

    #[test]
    fn test_queue_only_completes_matching_head() {
        let mut queue: DocumentQueue = vec![
            Document::invoice("12000", "/d"),
            Document::invoice("13000", "/d"),
        ]
        .into();

        let wrong = ExportRecord::new(&Document::invoice("13000", "/d"), 10, "x".into(), false);
        assert!(queue.complete(&wrong).is_none());
        assert_eq!(queue.len(), 2);

        let right = ExportRecord::new(&Document::invoice("12000", "/d"), 10, "x".into(), false);
        assert_eq!(queue.complete(&right).unwrap().identifier(), "12000");
        assert_eq!(queue.head().unwrap().identifier(), "13000");
    }

    #[test]
    fn test_document_deserializes_without_file_name() {
        let doc: Document = serde_json::from_str(
            r#"{"kind":"report","identifier":"Sales by Item","export_directory":"/tmp"}"#,
        )
        .unwrap();
        assert_eq!(doc.kind(), DocumentKind::Report);
        assert_eq!(doc.file_name(), "Sales by Item");
    }
}
