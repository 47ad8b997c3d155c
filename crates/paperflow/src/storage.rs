//! Content-addressed file layout: stored documents live at
//! `documents_directory/<hash>`, thumbnails at `thumbnail_directory/<hash>.png`.

use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first and falls back to
/// copy + delete for cross-device moves.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DocumentPaths {
    documents_directory: PathBuf,
    thumbnail_directory: PathBuf,
}

impl DocumentPaths {
    pub fn new(documents_directory: impl Into<PathBuf>, thumbnail_directory: impl Into<PathBuf>) -> Self {
        Self {
            documents_directory: documents_directory.into(),
            thumbnail_directory: thumbnail_directory.into(),
        }
    }

    pub fn documents_directory(&self) -> &Path {
        &self.documents_directory
    }

    pub fn document(&self, hash: &str) -> PathBuf {
        self.documents_directory.join(hash)
    }

    pub fn thumbnail(&self, hash: &str) -> PathBuf {
        self.thumbnail_directory.join(format!("{}.png", hash))
    }

    /// Moves `src` to the stored location for `hash`, creating the
    /// documents directory if needed.
    pub fn store(&self, src: &Path, hash: &str) -> Result<PathBuf, StorageError> {
        ensure_directory(&self.documents_directory)?;
        let dst = self.document(hash);
        move_file(src, &dst)?;
        Ok(dst)
    }
}
