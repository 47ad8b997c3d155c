//! Job bookkeeping records.
//!
//! Status and step are persisted as small integers. Decoding is strict:
//! an unknown code is an error, never a default.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Awaiting,
    Running,
    Finished,
    Failure,
}

impl JobStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Awaiting => 0,
            Self::Running => 1,
            Self::Finished => 2,
            Self::Failure => 3,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, DatabaseError> {
        match code {
            0 => Ok(Self::Awaiting),
            1 => Ok(Self::Running),
            2 => Ok(Self::Finished),
            3 => Ok(Self::Failure),
            other => Err(DatabaseError::InvalidCode {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failure)
    }
}

/// A pipeline step. `All` means every step has to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStep {
    All,
    Hash,
    Thumbnail,
    ParseContent,
    Rules,
    Fts,
}

impl ProcessStep {
    /// Steps run for a document that needs full processing.
    pub const ALL_STEPS: [ProcessStep; 5] = [
        ProcessStep::Hash,
        ProcessStep::Thumbnail,
        ProcessStep::ParseContent,
        ProcessStep::Rules,
        ProcessStep::Fts,
    ];

    pub fn code(self) -> i64 {
        match self {
            Self::All => 0,
            Self::Hash => 1,
            Self::Thumbnail => 2,
            Self::ParseContent => 3,
            Self::Rules => 4,
            Self::Fts => 5,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, DatabaseError> {
        match code {
            0 => Ok(Self::All),
            1 => Ok(Self::Hash),
            2 => Ok(Self::Thumbnail),
            3 => Ok(Self::ParseContent),
            4 => Ok(Self::Rules),
            5 => Ok(Self::Fts),
            other => Err(DatabaseError::InvalidCode {
                kind: "process step",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Hash => "hash",
            Self::Thumbnail => "thumbnail",
            Self::ParseContent => "parsecontent",
            Self::Rules => "rules",
            Self::Fts => "fts",
        };
        f.write_str(name)
    }
}

/// Descriptor for a step that is about to run. Not persisted itself.
#[derive(Debug, Clone)]
pub struct ProcessItem {
    pub document_id: String,
    pub step: ProcessStep,
    pub created_at: DateTime<Utc>,
}

impl ProcessItem {
    pub fn new(document_id: &str, step: ProcessStep) -> Self {
        Self {
            document_id: document_id.to_string(),
            step,
            created_at: Utc::now(),
        }
    }
}

/// Persisted record of one step execution for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i64,
    pub document_id: String,
    pub message: String,
    pub status: JobStatus,
    pub step: ProcessStep,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn duration(&self) -> Option<Duration> {
        self.stopped_at.map(|stopped| stopped - self.started_at)
    }
}
