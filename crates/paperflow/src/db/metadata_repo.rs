//! Document tags and metadata key/value assignments.

use rusqlite::{params, Connection};

use super::{Database, DatabaseError};
use crate::models::Metadata;

fn ensure_owned(conn: &Connection, user_id: i64, document_id: &str) -> Result<(), DatabaseError> {
    let owned: u32 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE id = ?1 AND user_id = ?2",
        params![document_id, user_id],
        |r| r.get(0),
    )?;
    if owned == 0 {
        return Err(DatabaseError::NotFound(format!("document {}", document_id)));
    }
    Ok(())
}

pub fn tags(db: &Database, user_id: i64, document_id: &str) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        ensure_owned(conn, user_id, document_id)?;
        let mut stmt =
            conn.prepare("SELECT tag FROM document_tags WHERE document_id = ?1 ORDER BY position")?;
        let tags = stmt
            .query_map(params![document_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    })
}

pub fn set_tags(
    db: &Database,
    user_id: i64,
    document_id: &str,
    tags: &[String],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        ensure_owned(conn, user_id, document_id)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM document_tags WHERE document_id = ?1", params![document_id])?;
        for (position, tag) in tags.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO document_tags (document_id, position, tag) VALUES (?1, ?2, ?3)",
                params![document_id, position as i64, tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    })
}

pub fn metadata(
    db: &Database,
    user_id: i64,
    document_id: &str,
) -> Result<Vec<Metadata>, DatabaseError> {
    db.with_conn(|conn| {
        ensure_owned(conn, user_id, document_id)?;
        let mut stmt = conn.prepare(
            "SELECT key_id, value_id FROM document_metadata WHERE document_id = ?1 ORDER BY position",
        )?;
        let metadata = stmt
            .query_map(params![document_id], |row| {
                Ok(Metadata {
                    key_id: row.get(0)?,
                    value_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(metadata)
    })
}

/// Replaces the document's metadata with `metadata`. Duplicate pairs are
/// stored once.
pub fn set_metadata(
    db: &Database,
    user_id: i64,
    document_id: &str,
    metadata: &[Metadata],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        ensure_owned(conn, user_id, document_id)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM document_metadata WHERE document_id = ?1",
            params![document_id],
        )?;
        for (position, pair) in metadata.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO document_metadata (document_id, position, key_id, value_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![document_id, position as i64, pair.key_id, pair.value_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    })
}
