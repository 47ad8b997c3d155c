//! Full-text search collaborator.

use crate::error::Result;
use crate::models::Document;

/// A search engine that accepts documents for indexing.
pub trait SearchIndex: Send + Sync {
    /// Indexes `documents` under the collection of `user_id`.
    fn index_documents(&self, documents: &[Document], user_id: i64) -> Result<()>;
}
