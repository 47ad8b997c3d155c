//! User lookups. Inbox directories are named after users.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::models::User;

pub fn insert(db: &Database, name: &str) -> Result<User, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("INSERT INTO users (name) VALUES (?1)", params![name])
            .map_err(|e| DatabaseError::from_write(e, &format!("user '{}'", name)))?;
        Ok(User {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    })
}

pub fn find_by_name(db: &Database, name: &str) -> Result<User, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT id, name FROM users WHERE name = ?1",
            params![name],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .map_err(|e| DatabaseError::from_read(e, &format!("user '{}'", name)))
    })
}
