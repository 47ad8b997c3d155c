use std::path::Path;

use crate::error::ProcessError;

/// Reads a text document. Invalid UTF-8 sequences are replaced.
pub fn read_text(path: &Path) -> Result<String, ProcessError> {
    let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
