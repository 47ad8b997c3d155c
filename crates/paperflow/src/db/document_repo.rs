//! Document repository: CRUD for the `documents` table.
//!
//! Tags and metadata live in their own tables and are not loaded here; see
//! [`super::metadata_repo`].

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::models::Document;

const COLUMNS: &str = "id, user_id, name, description, content, filename, hash, mimetype, size, \
                       date, created_at, updated_at";

fn timestamp(row: &Row<'_>, column: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(column)?;
    parse_timestamp(&raw).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

fn from_row(row: &Row<'_>) -> Result<Document, rusqlite::Error> {
    let size: i64 = row.get("size")?;
    Ok(Document {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        content: row.get("content")?,
        filename: row.get("filename")?,
        hash: row.get("hash")?,
        mimetype: row.get("mimetype")?,
        size: size.max(0) as u64,
        date: timestamp(row, "date")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
        tags: Vec::new(),
        metadata: Vec::new(),
    })
}

pub fn insert(db: &Database, doc: &Document) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                COLUMNS
            ),
            params![
                doc.id,
                doc.user_id,
                doc.name,
                doc.description,
                doc.content,
                doc.filename,
                doc.hash,
                doc.mimetype,
                doc.size as i64,
                format_timestamp(doc.date),
                format_timestamp(doc.created_at),
                format_timestamp(doc.updated_at),
            ],
        )
        .map_err(|e| DatabaseError::from_write(e, &format!("document {}", doc.id)))?;
        Ok(())
    })
}

/// Overwrites every column except `id`, `user_id` and `created_at`.
/// The row must belong to `user_id`.
pub fn update(db: &Database, user_id: i64, doc: &Document) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn
            .execute(
                "UPDATE documents SET name=?3, description=?4, content=?5, filename=?6, hash=?7,
                 mimetype=?8, size=?9, date=?10, updated_at=?11
                 WHERE id=?1 AND user_id=?2",
                params![
                    doc.id,
                    user_id,
                    doc.name,
                    doc.description,
                    doc.content,
                    doc.filename,
                    doc.hash,
                    doc.mimetype,
                    doc.size as i64,
                    format_timestamp(doc.date),
                    format_timestamp(doc.updated_at),
                ],
            )
            .map_err(|e| DatabaseError::from_write(e, &format!("document {}", doc.id)))?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(format!("document {}", doc.id)));
        }
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )
            .optional()?;
        Ok(doc)
    })
}

/// Finds a document by content hash. `user_id = None` searches all users.
pub fn find_by_hash(
    db: &Database,
    user_id: Option<i64>,
    hash: &str,
) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let doc = match user_id {
            Some(user_id) => conn
                .query_row(
                    &format!(
                        "SELECT {} FROM documents WHERE hash = ?1 AND user_id = ?2 LIMIT 1",
                        COLUMNS
                    ),
                    params![hash, user_id],
                    from_row,
                )
                .optional()?,
            None => conn
                .query_row(
                    &format!("SELECT {} FROM documents WHERE hash = ?1 LIMIT 1", COLUMNS),
                    params![hash],
                    from_row,
                )
                .optional()?,
        };
        Ok(doc)
    })
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        Ok(count)
    })
}
