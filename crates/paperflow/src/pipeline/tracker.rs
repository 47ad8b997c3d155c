//! Job bookkeeping around pipeline steps.
//!
//! [`StepTracker::start`] opens a `Running` job and hands back a
//! [`StepGuard`]. The guard writes the final job state when it is dropped,
//! so every exit path of a step (including `?` and unwinding) finalizes the
//! job exactly once.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{Job, JobStatus, ProcessItem, ProcessStep};
use crate::store::JobStore;

/// Message recorded when a guard is dropped before the step decided an outcome.
pub const STEP_ABORTED: &str = "step aborted";

#[derive(Clone)]
pub struct StepTracker {
    jobs: Arc<dyn JobStore>,
}

impl StepTracker {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    pub fn start(&self, document_id: &str, step: ProcessStep, message: &str) -> Result<StepGuard> {
        let item = ProcessItem::new(document_id, step);
        let job = self.jobs.start_process_item(&item, message)?;
        tracing::debug!(document_id, step = %step, job_id = job.id, "step started");
        Ok(StepGuard {
            jobs: Arc::clone(&self.jobs),
            job,
        })
    }
}

/// An open job. Dropping it persists the outcome.
pub struct StepGuard {
    jobs: Arc<dyn JobStore>,
    job: Job,
}

impl StepGuard {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Adds a diagnostic to the job message, `;`-separated.
    pub fn append_message(&mut self, text: &str) {
        append(&mut self.job.message, text);
    }

    pub fn finish(mut self) {
        self.job.status = JobStatus::Finished;
    }

    /// Finishes the job, replacing its message.
    pub fn finish_with(mut self, message: &str) {
        self.job.message = message.to_string();
        self.job.status = JobStatus::Finished;
    }

    pub fn fail(mut self, reason: &str) {
        self.append_message(reason);
        self.job.status = JobStatus::Failure;
    }

    fn finalize(&mut self) {
        if !self.job.status.is_terminal() {
            self.job.status = JobStatus::Failure;
            append(&mut self.job.message, STEP_ABORTED);
        }
        self.job.stopped_at = Some(Utc::now());

        if let Err(e) = self.jobs.complete_job(&self.job) {
            tracing::error!(
                document_id = %self.job.document_id,
                job_id = self.job.id,
                "complete job: {}",
                e
            );
        }
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn append(message: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !message.is_empty() {
        message.push_str("; ");
    }
    message.push_str(text);
}
