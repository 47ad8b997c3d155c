//! Test harness for isolated test execution.
//!
//! The `TestHarness` provides temporary inbox/documents/thumbnail directories,
//! an in-memory database, and helpers to build a pipeline and drive a worker
//! task synchronously.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use paperflow::alert::{AlertSink, Alerting};
use paperflow::config::ExtractionConfig;
use paperflow::db::{document_repo, rule_repo, user_repo, Database};
use paperflow::models::{Document, Job, Rule, User};
use paperflow::processor::{ContentExtractor, ExtractorRegistry, ImageThumbnailer};
use paperflow::search::SearchIndex;
use paperflow::storage::DocumentPaths;
use paperflow::store::Stores;
use paperflow::worker::{FileProcessor, WorkItem};
use paperflow::Pipeline;

use super::fakes::{RecordingAlerts, RecordingSearch};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub db: Database,
    pub stores: Stores,
    pub search: Arc<RecordingSearch>,
    pub alerts: Arc<RecordingAlerts>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_search(RecordingSearch::default())
    }

    pub fn with_search(search: RecordingSearch) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("inbox");
        let documents_dir = base.join("documents");
        let thumbnail_dir = base.join("thumbnails");
        fs::create_dir_all(&input_dir).expect("Failed to create inbox directory");
        fs::create_dir_all(&documents_dir).expect("Failed to create documents directory");

        let db = Database::open_in_memory().expect("Failed to open database");
        let stores = Stores::from_database(db.clone());

        Self {
            temp_dir,
            input_dir,
            documents_dir,
            thumbnail_dir,
            db,
            stores,
            search: Arc::new(search),
            alerts: Arc::new(RecordingAlerts::default()),
        }
    }

    pub fn paths(&self) -> DocumentPaths {
        DocumentPaths::new(&self.documents_dir, &self.thumbnail_dir)
    }

    /// Pipeline with the default extractors and the recording search index.
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with(Arc::new(ExtractorRegistry::new(&ExtractionConfig::default())))
    }

    pub fn pipeline_with(&self, extractor: Arc<dyn ContentExtractor>) -> Pipeline {
        let search: Arc<dyn SearchIndex> = self.search.clone();
        Pipeline::new(
            self.stores.clone(),
            Some(search),
            extractor,
            Arc::new(ImageThumbnailer::default()),
            self.paths(),
        )
    }

    pub fn pipeline_without_search(&self) -> Pipeline {
        Pipeline::new(
            self.stores.clone(),
            None,
            Arc::new(ExtractorRegistry::new(&ExtractionConfig::default())),
            Arc::new(ImageThumbnailer::default()),
            self.paths(),
        )
    }

    pub fn alerting(&self) -> Alerting {
        let sink: Arc<dyn AlertSink> = self.alerts.clone();
        Alerting::new(true, Some(sink))
    }

    pub fn add_user(&self, name: &str) -> User {
        user_repo::insert(&self.db, name).expect("Failed to insert user")
    }

    pub fn add_rule(&self, rule: &Rule) -> i64 {
        rule_repo::insert(&self.db, rule).expect("Failed to insert rule")
    }

    /// Writes `input/<user>/<filename>` and returns its path.
    pub fn inbox_file(&self, user: &str, filename: &str, contents: &[u8]) -> PathBuf {
        let dir = self.input_dir.join(user);
        fs::create_dir_all(&dir).expect("Failed to create user inbox");
        let path = dir.join(filename);
        fs::write(&path, contents).expect("Failed to write inbox file");
        path
    }

    /// Stores `contents` under its hash and creates the matching record.
    pub fn stored_document(&self, user: &User, filename: &str, contents: &[u8]) -> Document {
        let hash = hash_bytes(contents);
        let doc = Document::new(user.id, filename, hash.clone());
        fs::write(self.documents_dir.join(&hash), contents).expect("Failed to write document");
        document_repo::insert(&self.db, &doc).expect("Failed to insert document");
        doc
    }

    pub fn document_path(&self, doc: &Document) -> PathBuf {
        self.documents_dir.join(&doc.hash)
    }

    /// Queues `items` on a fresh task and runs it on the current thread until
    /// the queue is drained.
    pub fn run_items(&self, pipeline: Pipeline, items: Vec<WorkItem>) {
        let (task, handle) = FileProcessor::new(
            0,
            items.len().max(1),
            pipeline,
            self.alerting(),
            Arc::new(AtomicBool::new(false)),
        );
        for item in items {
            handle.enqueue(item).expect("Failed to enqueue item");
        }
        drop(handle);
        task.run();
    }

    pub fn reload(&self, doc: &Document) -> Document {
        self.stores
            .documents
            .get_by_id(&doc.id)
            .expect("Failed to reload document")
    }

    pub fn jobs(&self, document_id: &str) -> Vec<Job> {
        self.stores
            .jobs
            .jobs_for_document(document_id)
            .expect("Failed to list jobs")
    }

    pub fn document_count(&self) -> u64 {
        document_repo::count(&self.db).expect("Failed to count documents")
    }
}

pub fn hash_bytes(contents: &[u8]) -> String {
    hex::encode(Sha256::digest(contents))
}
