//! Collaborator doubles for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use crossbeam_channel::Receiver;

use paperflow::alert::{AlertDetails, AlertSink};
use paperflow::error::{PaperflowError, ProcessError, Result};
use paperflow::models::Document;
use paperflow::processor::{ContentExtractor, DocumentFormat};
use paperflow::search::SearchIndex;

/// Marker that makes [`PanickingExtractor`] panic.
pub const PANIC_MARKER: &str = "PANIC";

/// Records every indexing call; optionally fails them all.
#[derive(Default)]
pub struct RecordingSearch {
    pub indexed: Mutex<Vec<(String, i64)>>,
    pub fail: bool,
}

impl RecordingSearch {
    pub fn failing() -> Self {
        Self {
            indexed: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn indexed_ids(&self) -> Vec<String> {
        self.indexed
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl SearchIndex for RecordingSearch {
    fn index_documents(&self, documents: &[Document], user_id: i64) -> Result<()> {
        if self.fail {
            return Err(PaperflowError::Internal("search engine offline".to_string()));
        }
        let mut indexed = self.indexed.lock().unwrap();
        for doc in documents {
            indexed.push((doc.id.clone(), user_id));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub sent: Mutex<Vec<AlertDetails>>,
}

impl AlertSink for RecordingAlerts {
    fn send_mail(&self, details: &AlertDetails) -> Result<()> {
        self.sent.lock().unwrap().push(details.clone());
        Ok(())
    }
}

/// Alert sink whose transport panics on every send.
pub struct PanickingAlerts;

impl AlertSink for PanickingAlerts {
    fn send_mail(&self, details: &AlertDetails) -> Result<()> {
        panic!("mail transport crashed while sending '{}'", details.message);
    }
}

/// Reads files as text and panics on any file containing [`PANIC_MARKER`].
pub struct PanickingExtractor;

impl ContentExtractor for PanickingExtractor {
    fn extract(&self, path: &Path, _format: DocumentFormat) -> std::result::Result<String, ProcessError> {
        let text = std::fs::read_to_string(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        if text.contains(PANIC_MARKER) {
            panic!("extractor exploded on {}", path.display());
        }
        Ok(text)
    }
}

/// Blocks every extraction until the release channel yields or disconnects.
pub struct BlockingExtractor {
    pub release: Receiver<()>,
}

impl ContentExtractor for BlockingExtractor {
    fn extract(&self, _path: &Path, _format: DocumentFormat) -> std::result::Result<String, ProcessError> {
        let _ = self.release.recv();
        Ok(String::new())
    }
}
