use std::path::Path;

use crate::error::ProcessError;

/// Extracts embedded text from every page with lopdf. Pages whose text
/// cannot be decoded are skipped.
pub fn extract_text(path: &Path) -> Result<String, ProcessError> {
    let _span = tracing::info_span!("processor.pdf").entered();

    let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;
    let doc = lopdf::Document::load_mem(&bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => tracing::debug!(page = page_num, "skip page without text: {}", e),
        }
    }

    Ok(text)
}
