//! Persistence interfaces consumed by the pipeline.
//!
//! [`Database`] implements all of them; tests substitute fakes per trait.

use std::sync::Arc;

use crate::db::{document_repo, job_repo, metadata_repo, rule_repo, user_repo, Database};
use crate::error::{PaperflowError, Result};
use crate::models::{Document, Job, Metadata, ProcessItem, Rule, User};

pub trait JobStore: Send + Sync {
    /// Persists a new `Running` job for `item`.
    fn start_process_item(&self, item: &ProcessItem, message: &str) -> Result<Job>;

    /// Persists the final status, message and stop time of `job`.
    fn complete_job(&self, job: &Job) -> Result<()>;

    /// Marks every non-terminal job of the document as failed.
    fn cancel_document_processing(&self, document_id: &str) -> Result<()>;

    fn jobs_for_document(&self, document_id: &str) -> Result<Vec<Job>>;
}

pub trait DocumentStore: Send + Sync {
    /// Looks a document up by content hash. `user_id = None` searches every
    /// user. Misses are [`PaperflowError::NotFound`].
    fn get_by_hash(&self, user_id: Option<i64>, hash: &str) -> Result<Document>;

    fn get_by_id(&self, id: &str) -> Result<Document>;

    fn create(&self, document: &Document) -> Result<()>;

    fn update(&self, user_id: i64, document: &Document) -> Result<()>;
}

pub trait UserStore: Send + Sync {
    fn get_user_by_name(&self, name: &str) -> Result<User>;
}

pub trait MetadataStore: Send + Sync {
    fn get_document_tags(&self, user_id: i64, document_id: &str) -> Result<Vec<String>>;

    fn get_document_metadata(&self, user_id: i64, document_id: &str) -> Result<Vec<Metadata>>;

    fn update_document_metadata(
        &self,
        user_id: i64,
        document_id: &str,
        metadata: &[Metadata],
    ) -> Result<()>;
}

pub trait RuleStore: Send + Sync {
    /// Enabled rules of the user, in evaluation order.
    fn get_active_rules(&self, user_id: i64) -> Result<Vec<Rule>>;
}

/// The set of stores a worker talks to.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub users: Arc<dyn UserStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub rules: Arc<dyn RuleStore>,
}

impl Stores {
    pub fn from_database(db: Database) -> Self {
        let db = Arc::new(db);
        Self {
            jobs: db.clone(),
            documents: db.clone(),
            users: db.clone(),
            metadata: db.clone(),
            rules: db,
        }
    }
}

impl JobStore for Database {
    fn start_process_item(&self, item: &ProcessItem, message: &str) -> Result<Job> {
        Ok(job_repo::start(self, item, message)?)
    }

    fn complete_job(&self, job: &Job) -> Result<()> {
        Ok(job_repo::complete(self, job)?)
    }

    fn cancel_document_processing(&self, document_id: &str) -> Result<()> {
        let cancelled = job_repo::cancel_for_document(self, document_id)?;
        log::debug!("Cancelled {} open jobs of document {}", cancelled, document_id);
        Ok(())
    }

    fn jobs_for_document(&self, document_id: &str) -> Result<Vec<Job>> {
        Ok(job_repo::find_by_document(self, document_id)?)
    }
}

impl DocumentStore for Database {
    fn get_by_hash(&self, user_id: Option<i64>, hash: &str) -> Result<Document> {
        document_repo::find_by_hash(self, user_id, hash)?
            .ok_or_else(|| PaperflowError::NotFound(format!("document with hash {}", hash)))
    }

    fn get_by_id(&self, id: &str) -> Result<Document> {
        document_repo::find_by_id(self, id)?
            .ok_or_else(|| PaperflowError::NotFound(format!("document {}", id)))
    }

    fn create(&self, document: &Document) -> Result<()> {
        Ok(document_repo::insert(self, document)?)
    }

    fn update(&self, user_id: i64, document: &Document) -> Result<()> {
        Ok(document_repo::update(self, user_id, document)?)
    }
}

impl UserStore for Database {
    fn get_user_by_name(&self, name: &str) -> Result<User> {
        Ok(user_repo::find_by_name(self, name)?)
    }
}

impl MetadataStore for Database {
    fn get_document_tags(&self, user_id: i64, document_id: &str) -> Result<Vec<String>> {
        Ok(metadata_repo::tags(self, user_id, document_id)?)
    }

    fn get_document_metadata(&self, user_id: i64, document_id: &str) -> Result<Vec<Metadata>> {
        Ok(metadata_repo::metadata(self, user_id, document_id)?)
    }

    fn update_document_metadata(
        &self,
        user_id: i64,
        document_id: &str,
        metadata: &[Metadata],
    ) -> Result<()> {
        Ok(metadata_repo::set_metadata(self, user_id, document_id, metadata)?)
    }
}

impl RuleStore for Database {
    fn get_active_rules(&self, user_id: i64) -> Result<Vec<Rule>> {
        Ok(rule_repo::find_active(self, user_id)?)
    }
}
