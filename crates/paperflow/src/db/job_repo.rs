//! Job repository: one row per executed pipeline step.

use chrono::Utc;
use rusqlite::{params, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::models::{Job, JobStatus, ProcessItem, ProcessStep};

/// A raw job row; status and step are still undecoded integer codes.
#[derive(Debug, Clone)]
struct JobRow {
    id: i64,
    document_id: String,
    message: String,
    status: i64,
    step: i64,
    started_at: String,
    stopped_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            message: row.get("message")?,
            status: row.get("status")?,
            step: row.get("step")?,
            started_at: row.get("started_at")?,
            stopped_at: row.get("stopped_at")?,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = DatabaseError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            document_id: row.document_id,
            message: row.message,
            status: JobStatus::from_code(row.status)?,
            step: ProcessStep::from_code(row.step)?,
            started_at: parse_timestamp(&row.started_at)?,
            stopped_at: row.stopped_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Opens a `Running` job for the step described by `item`.
pub fn start(db: &Database, item: &ProcessItem, message: &str) -> Result<Job, DatabaseError> {
    let started_at = Utc::now();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (document_id, message, status, step, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.document_id,
                message,
                JobStatus::Running.code(),
                item.step.code(),
                format_timestamp(started_at),
            ],
        )
        .map_err(|e| DatabaseError::from_write(e, &format!("document {}", item.document_id)))?;

        Ok(Job {
            id: conn.last_insert_rowid(),
            document_id: item.document_id.clone(),
            message: message.to_string(),
            status: JobStatus::Running,
            step: item.step,
            started_at,
            stopped_at: None,
        })
    })
}

/// Persists status, message and stop time of a job.
pub fn complete(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET message = ?2, status = ?3, stopped_at = ?4 WHERE id = ?1",
            params![
                job.id,
                job.message,
                job.status.code(),
                job.stopped_at.map(format_timestamp),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(format!("job {}", job.id)));
        }
        Ok(())
    })
}

/// Marks every non-terminal job of the document as failed.
/// Returns the number of jobs cancelled.
pub fn cancel_for_document(db: &Database, document_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, stopped_at = ?3,
             message = CASE WHEN message = '' THEN 'cancelled' ELSE message || '; cancelled' END
             WHERE document_id = ?1 AND status IN (?4, ?5)",
            params![
                document_id,
                JobStatus::Failure.code(),
                format_timestamp(Utc::now()),
                JobStatus::Awaiting.code(),
                JobStatus::Running.code(),
            ],
        )?;
        Ok(changed)
    })
}

pub fn find_by_document(db: &Database, document_id: &str) -> Result<Vec<Job>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE document_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![document_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    rows.into_iter().map(Job::try_from).collect()
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{document_repo, user_repo};
    use crate::models::Document;

    fn setup() -> (Database, Document) {
        let db = Database::open_in_memory().unwrap();
        let user = user_repo::insert(&db, "alice").unwrap();
        let doc = Document::new(user.id, "report.pdf", "h1".to_string());
        document_repo::insert(&db, &doc).unwrap();
        (db, doc)
    }

    #[test]
    fn test_start_and_complete() {
        let (db, doc) = setup();
        let item = ProcessItem::new(&doc.id, ProcessStep::Hash);
        let mut job = start(&db, &item, "calculate hash").unwrap();
        assert_eq!(job.status, JobStatus::Running);

        job.status = JobStatus::Finished;
        job.stopped_at = Some(Utc::now());
        complete(&db, &job).unwrap();

        let jobs = find_by_document(&db, &doc.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Finished);
        assert_eq!(jobs[0].step, ProcessStep::Hash);
        assert_eq!(jobs[0].message, "calculate hash");
        assert!(jobs[0].stopped_at.is_some());
    }

    #[test]
    fn test_start_for_missing_document_is_not_found() {
        let (db, _doc) = setup();
        let item = ProcessItem::new("missing", ProcessStep::Hash);
        let err = start(&db, &item, "calculate hash").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[test]
    fn test_cancel_only_touches_open_jobs() {
        let (db, doc) = setup();
        let mut done = start(&db, &ProcessItem::new(&doc.id, ProcessStep::Hash), "hash").unwrap();
        done.status = JobStatus::Finished;
        done.stopped_at = Some(Utc::now());
        complete(&db, &done).unwrap();
        start(&db, &ProcessItem::new(&doc.id, ProcessStep::Thumbnail), "").unwrap();

        assert_eq!(cancel_for_document(&db, &doc.id).unwrap(), 1);

        let jobs = find_by_document(&db, &doc.id).unwrap();
        assert_eq!(jobs[0].status, JobStatus::Finished);
        assert_eq!(jobs[0].message, "hash");
        assert_eq!(jobs[1].status, JobStatus::Failure);
        assert_eq!(jobs[1].message, "cancelled");
        assert!(jobs[1].stopped_at.is_some());

        // nothing left to cancel
        assert_eq!(cancel_for_document(&db, &doc.id).unwrap(), 0);
    }

    #[test]
    fn test_unknown_status_code_fails_to_load() {
        let (db, doc) = setup();
        start(&db, &ProcessItem::new(&doc.id, ProcessStep::Hash), "").unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE jobs SET status = 9", [])?;
            Ok(())
        })
        .unwrap();

        let err = find_by_document(&db, &doc.id).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidCode { kind: "job status", .. }));
    }

    #[test]
    fn test_corrupt_stop_time_fails_to_load() {
        let (db, doc) = setup();
        let job = start(&db, &ProcessItem::new(&doc.id, ProcessStep::Hash), "").unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE jobs SET stopped_at = 'soon' WHERE id = ?1", [job.id])?;
            Ok(())
        })
        .unwrap();

        let err = find_by_document(&db, &doc.id).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidCode { kind: "timestamp", .. }));
    }
}
