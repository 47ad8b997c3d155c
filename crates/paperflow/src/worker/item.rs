use std::path::PathBuf;

use crate::models::Document;

/// A unit of work for a worker task.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A new file picked up from a user's inbox directory.
    File(PathBuf),
    /// An existing document to run through every step again.
    Document {
        document: Box<Document>,
        source_file: PathBuf,
    },
}

impl WorkItem {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn document(document: Document, source_file: impl Into<PathBuf>) -> Self {
        Self::Document {
            document: Box::new(document),
            source_file: source_file.into(),
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::File(_) => None,
            Self::Document { document, .. } => Some(&document.id),
        }
    }
}
