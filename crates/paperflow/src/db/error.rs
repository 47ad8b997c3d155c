//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// Lookup miss or a reference to a missing row.
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint violation.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A persisted enum code that this version does not know.
    #[error("unknown {kind}: {value}")]
    InvalidCode { kind: &'static str, value: String },
}

impl DatabaseError {
    /// Classifies a write error for `resource`, turning constraint
    /// violations into `AlreadyExists` / `NotFound`.
    pub fn from_write(err: rusqlite::Error, resource: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::AlreadyExists(resource.to_string());
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return Self::NotFound(resource.to_string());
                }
                _ => {}
            }
        }
        Self::Sqlite(err)
    }

    /// Classifies a single-row read error, turning an empty result into `NotFound`.
    pub fn from_read(err: rusqlite::Error, resource: &str) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound(resource.to_string()),
            other => Self::Sqlite(other),
        }
    }
}
