pub mod alert;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod rules;
pub mod search;
pub mod storage;
pub mod store;
pub mod worker;

pub use alert::{AlertDetails, AlertSink, Alerting};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, PaperflowError, ProcessError, Result, StorageError, WorkerError,
};
pub use models::{Document, Job, JobStatus, ProcessItem, ProcessStep, Rule, RuleMode};
pub use pipeline::{Pipeline, SourceFile, StepGuard, StepTracker};
pub use processor::{ContentExtractor, DocumentFormat, ThumbnailGenerator};
pub use rules::DocumentRule;
pub use search::SearchIndex;
pub use storage::DocumentPaths;
pub use store::Stores;
pub use worker::{InboxScanner, WorkItem, WorkerPool};
