use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user owning documents. Ingestion maps inbox directory names to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// A single metadata key/value assignment on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    pub key_id: i64,
    pub value_id: i64,
}

impl Metadata {
    pub fn new(key_id: i64, value_id: i64) -> Self {
        Self { key_id, value_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    /// Extracted text.
    pub content: String,
    /// Original filename at ingestion time.
    pub filename: String,
    /// Content hash, also the file name under the documents directory.
    pub hash: String,
    pub mimetype: Option<String>,
    pub size: u64,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
}

impl Document {
    /// Creates a fresh record for a file picked up from the inbox.
    pub fn new(user_id: i64, filename: &str, hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            name: filename.to_string(),
            description: String::new(),
            content: String::new(),
            filename: filename.to_string(),
            hash,
            mimetype: mime_guess::from_path(Path::new(filename))
                .first()
                .map(|m| m.to_string()),
            size: 0,
            date: now,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn has_metadata_key(&self, key_id: i64) -> bool {
        self.metadata.iter().any(|m| m.key_id == key_id)
    }

    pub fn has_metadata(&self, key_id: i64, value_id: i64) -> bool {
        self.metadata
            .iter()
            .any(|m| m.key_id == key_id && m.value_id == value_id)
    }
}
