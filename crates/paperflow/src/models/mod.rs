//! Domain records shared by the pipeline, the rule engine and the stores.

pub mod document;
pub mod job;
pub mod rule;

pub use document::{Document, Metadata, User};
pub use job::{Job, JobStatus, ProcessItem, ProcessStep};
pub use rule::{ActionKind, ConditionKind, Rule, RuleAction, RuleCondition, RuleMode};
