//! Document pipeline steps.
//!
//! Each step is bracketed by a job through [`StepTracker`]. Steps mutate the
//! in-memory [`Document`] and persist it themselves; ordering and error
//! policy across steps belong to the worker task.

pub mod tracker;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{info, info_span, warn};

use crate::error::{PaperflowError, ProcessError, Result, StorageError};
use crate::models::{Document, ProcessStep};
use crate::processor::{hash_file, ContentExtractor, DocumentFormat, ThumbnailGenerator};
use crate::rules::DocumentRule;
use crate::search::SearchIndex;
use crate::storage::{self, DocumentPaths};
use crate::store::Stores;

pub use tracker::{StepGuard, StepTracker, STEP_ABORTED};

pub const NO_HASH_CHANGE: &str = "hash: no change";
pub const ERROR_NAME_MARKER: &str = "(Error)";
pub const ERROR_DESCRIPTION_PREFIX: &str = "(Processing error";

/// `asctime`-style timestamp used in cancellation descriptions.
const ANSIC: &str = "%a %b %e %H:%M:%S %Y";

/// The file behind the document being processed, opened lazily.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    file: Option<File>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_open(&mut self) -> std::result::Result<&mut File, StorageError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path).map_err(|e| StorageError::OpenFile {
                path: self.path.clone(),
                source: e,
            })?,
        };
        Ok(self.file.insert(file))
    }

    pub fn hash(&mut self) -> Result<String> {
        let path = self.path.clone();
        let file = self.ensure_open()?;
        hash_file(file).map_err(|e| ProcessError::Hash { path, source: e }.into())
    }

    /// Records that the file now lives at `path`. An open handle stays valid.
    fn moved_to(&mut self, path: PathBuf) {
        self.path = path;
    }
}

/// Collaborators shared by all workers.
#[derive(Clone)]
pub struct Pipeline {
    stores: Stores,
    tracker: StepTracker,
    search: Option<Arc<dyn SearchIndex>>,
    extractor: Arc<dyn ContentExtractor>,
    thumbnailer: Arc<dyn ThumbnailGenerator>,
    paths: DocumentPaths,
}

impl Pipeline {
    pub fn new(
        stores: Stores,
        search: Option<Arc<dyn SearchIndex>>,
        extractor: Arc<dyn ContentExtractor>,
        thumbnailer: Arc<dyn ThumbnailGenerator>,
        paths: DocumentPaths,
    ) -> Self {
        let tracker = StepTracker::new(Arc::clone(&stores.jobs));
        Self {
            stores,
            tracker,
            search,
            extractor,
            thumbnailer,
            paths,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn paths(&self) -> &DocumentPaths {
        &self.paths
    }

    /// Recomputes the content hash.
    ///
    /// Unchanged: the job finishes with "hash: no change" and nothing moves.
    /// Changed: the record is persisted with the new hash first, then the
    /// file is moved to its new content-addressed path. If the move fails the
    /// record is rolled back to the old hash.
    pub fn update_hash(&self, doc: &mut Document, source: &mut SourceFile) -> Result<()> {
        let _span = info_span!("update_hash", document_id = %doc.id).entered();
        let step = self.tracker.start(&doc.id, ProcessStep::Hash, "calculate hash")?;

        let hash = match source.hash() {
            Ok(hash) => hash,
            Err(e) => {
                step.fail(&e.to_string());
                return Err(e);
            }
        };

        if hash == doc.hash {
            info!("file hash has not changed");
            step.finish_with(NO_HASH_CHANGE);
            return Ok(());
        }

        info!("rename file {} to {}", doc.hash, hash);
        let old_hash = std::mem::replace(&mut doc.hash, hash);

        if let Err(e) = self.stores.documents.update(doc.user_id, doc) {
            doc.hash = old_hash;
            step.fail(&format!("save updated document: {}", e));
            return Err(e);
        }

        let target = self.paths.document(&doc.hash);
        let moved = storage::ensure_directory(self.paths.documents_directory())
            .and_then(|_| storage::move_file(source.path(), &target));
        if let Err(e) = moved {
            let new_hash = std::mem::replace(&mut doc.hash, old_hash);
            if let Err(rollback) = self.stores.documents.update(doc.user_id, doc) {
                tracing::error!(
                    "roll back hash {} -> {} of document {}: {}",
                    new_hash,
                    doc.hash,
                    doc.id,
                    rollback
                );
            }
            step.fail(&format!("rename file (doc {}) by old hash: {}", doc.id, e));
            return Err(e.into());
        }

        source.moved_to(target);
        step.finish();
        Ok(())
    }

    pub fn generate_thumbnail(&self, doc: &Document, source: &SourceFile) -> Result<()> {
        let _span = info_span!("generate_thumbnail", document_id = %doc.id).entered();
        let step = self
            .tracker
            .start(&doc.id, ProcessStep::Thumbnail, "generate thumbnail")?;

        let result = DocumentFormat::from_filename(&doc.filename).and_then(|format| {
            self.thumbnailer
                .generate(source.path(), format, &self.paths.thumbnail(&doc.hash))
        });

        match result {
            Ok(()) => {
                step.finish();
                Ok(())
            }
            Err(e) => {
                step.fail(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Extracts text into `doc.content` and persists the document.
    pub fn parse_content(&self, doc: &mut Document, source: &SourceFile) -> Result<()> {
        let _span = info_span!("parse_content", document_id = %doc.id).entered();
        let step = self
            .tracker
            .start(&doc.id, ProcessStep::ParseContent, "parse content")?;

        let text = match DocumentFormat::from_filename(&doc.filename)
            .and_then(|format| self.extractor.extract(source.path(), format))
        {
            Ok(text) => text,
            Err(e) => {
                step.fail(&e.to_string());
                return Err(e.into());
            }
        };

        doc.content = text;
        doc.updated_at = chrono::Utc::now();
        if let Err(e) = self.stores.documents.update(doc.user_id, doc) {
            step.fail(&format!("save document content: {}", e));
            return Err(e);
        }

        step.finish();
        Ok(())
    }

    /// Evaluates the owner's active rules in order and applies the actions
    /// of every matching rule. Rule errors are recorded on the job and do not
    /// stop later rules.
    pub fn run_rules(&self, doc: &mut Document) -> Result<()> {
        let _span = info_span!("run_rules", document_id = %doc.id).entered();
        let mut step = self.tracker.start(&doc.id, ProcessStep::Rules, "run rules")?;

        let rules = match self.stores.rules.get_active_rules(doc.user_id) {
            Ok(rules) => rules,
            Err(e) => {
                step.fail(&format!("load rules: {}", e));
                return Err(e);
            }
        };

        if doc.metadata.is_empty() {
            match self
                .stores
                .metadata
                .get_document_metadata(doc.user_id, &doc.id)
            {
                Ok(metadata) => doc.metadata = metadata,
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("get document metadata: {}", e),
            }
        }

        let mut matched = 0;
        let mut failed = false;
        for rule in &rules {
            let mut evaluation = DocumentRule::new(doc, rule);
            match evaluation.matches() {
                Ok(true) => {
                    matched += 1;
                    if let Err(e) = evaluation.run_actions() {
                        warn!(rule_id = rule.id, "run rule actions: {}", e);
                        step.append_message(&format!("rule {}: {}", rule.id, e));
                        failed = true;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(rule_id = rule.id, "match rule: {}", e);
                    step.append_message(&format!("rule {}: {}", rule.id, e));
                    failed = true;
                }
            }
        }
        step.append_message(&format!("{} of {} rules matched", matched, rules.len()));

        if matched > 0 {
            doc.updated_at = chrono::Utc::now();
            let persisted = self
                .stores
                .documents
                .update(doc.user_id, doc)
                .and_then(|_| {
                    self.stores
                        .metadata
                        .update_document_metadata(doc.user_id, &doc.id, &doc.metadata)
                });
            if let Err(e) = persisted {
                step.fail(&format!("save document: {}", e));
                return Err(e);
            }
        }

        if failed {
            step.fail("");
        } else {
            step.finish();
        }
        Ok(())
    }

    /// Indexes the document into search. An indexing failure fails the job
    /// but is not returned, so later steps still run.
    pub fn index_search_content(&self, doc: &mut Document) -> Result<()> {
        let _span = info_span!("index_search_content", document_id = %doc.id).entered();
        let step = self
            .tracker
            .start(&doc.id, ProcessStep::Fts, "index for search engine")?;

        if doc.tags.is_empty() {
            match self.stores.metadata.get_document_tags(doc.user_id, &doc.id) {
                Ok(tags) => doc.tags = tags,
                Err(e) if e.is_not_found() => {}
                Err(e) => tracing::error!("get document tags: {}", e),
            }
        }
        if doc.metadata.is_empty() {
            match self
                .stores
                .metadata
                .get_document_metadata(doc.user_id, &doc.id)
            {
                Ok(metadata) => doc.metadata = metadata,
                Err(e) if e.is_not_found() => {}
                Err(e) => tracing::error!("get document metadata: {}", e),
            }
        }

        let Some(search) = &self.search else {
            step.fail("no search engine available");
            return Err(PaperflowError::Internal(
                "no search engine available".to_string(),
            ));
        };

        match search.index_documents(std::slice::from_ref(&*doc), doc.user_id) {
            Ok(()) => step.finish(),
            Err(e) => step.fail(&e.to_string()),
        }
        Ok(())
    }

    /// Marks the document as failed: open jobs become `Failure`, the name
    /// gets an "(Error)" marker and the description a timestamped reason.
    /// Repeated calls do not stack markers.
    pub fn cancel_document_processing(&self, doc: &mut Document, reason: &str) -> Result<()> {
        warn!("cancel processing document {} due to errors", doc.id);
        if let Err(e) = self.stores.jobs.cancel_document_processing(&doc.id) {
            tracing::error!("cancel document processing: {}", e);
        }

        mark_failed(doc, reason);

        self.stores
            .documents
            .update(doc.user_id, doc)
            .map_err(|e| PaperflowError::Internal(format!("update document: {}", e)))
    }
}

fn mark_failed(doc: &mut Document, reason: &str) {
    if !doc.name.starts_with(ERROR_NAME_MARKER) {
        doc.name = if doc.name.is_empty() {
            ERROR_NAME_MARKER.to_string()
        } else {
            format!("{} {}", ERROR_NAME_MARKER, doc.name)
        };
    }

    if !doc.description.starts_with(ERROR_DESCRIPTION_PREFIX) {
        let stamp = format!(
            "{} at {}: {})",
            ERROR_DESCRIPTION_PREFIX,
            Local::now().format(ANSIC),
            reason
        );
        doc.description = if doc.description.is_empty() {
            stamp
        } else {
            format!("{}\n{}", stamp, doc.description)
        };
    }
}
