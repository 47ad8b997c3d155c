//! Content extraction, thumbnails and hashing.
//!
//! Stored documents are named by hash without an extension, so callers pass
//! the [`DocumentFormat`] detected from the original filename.

pub mod command;
pub mod hash;
pub mod pdf;
pub mod text;
pub mod thumbnail;

use std::path::Path;

use crate::config::schema::ExtractionConfig;
use crate::error::ProcessError;

pub use hash::hash_file;
pub use thumbnail::ImageThumbnailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Image,
    Office,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" | "csv" => Some(Self::Text),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" | "webp" => Some(Self::Image),
            "docx" | "doc" | "odt" | "rtf" | "epub" => Some(Self::Office),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Result<Self, ProcessError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| ProcessError::UnsupportedFormat(ext.to_string()))
    }
}

/// Turns a stored file into plain text.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, path: &Path, format: DocumentFormat) -> Result<String, ProcessError>;
}

/// Renders a preview image of a stored file to `target`.
pub trait ThumbnailGenerator: Send + Sync {
    fn generate(&self, source: &Path, format: DocumentFormat, target: &Path)
        -> Result<(), ProcessError>;
}

/// Picks an extraction strategy per format, honouring which external
/// converters are enabled.
pub struct ExtractorRegistry {
    use_pdftotext: bool,
    use_pandoc: bool,
    ocr: Option<command::Tesseract>,
}

impl ExtractorRegistry {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            use_pdftotext: config.use_pdftotext,
            use_pandoc: config.use_pandoc,
            ocr: config
                .use_ocr
                .then(|| command::Tesseract::new(&config.ocr_languages)),
        }
    }
}

impl ContentExtractor for ExtractorRegistry {
    fn extract(&self, path: &Path, format: DocumentFormat) -> Result<String, ProcessError> {
        match format {
            DocumentFormat::Text => text::read_text(path),
            DocumentFormat::Pdf if self.use_pdftotext => command::pdftotext(path),
            DocumentFormat::Pdf => pdf::extract_text(path),
            DocumentFormat::Image => match &self.ocr {
                Some(ocr) => ocr.image_to_text(path),
                None => Err(ProcessError::UnsupportedFormat(
                    "image (OCR disabled)".to_string(),
                )),
            },
            DocumentFormat::Office if self.use_pandoc => command::pandoc_to_text(path),
            DocumentFormat::Office => Err(ProcessError::UnsupportedFormat(
                "office document (pandoc disabled)".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn registry() -> ExtractorRegistry {
        ExtractorRegistry::new(&ExtractionConfig::default())
    }

    #[test]
    fn test_format_from_filename() {
        assert_eq!(DocumentFormat::from_filename("a.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("scan.jpeg").unwrap(), DocumentFormat::Image);
        assert_eq!(DocumentFormat::from_filename("notes.md").unwrap(), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_filename("letter.odt").unwrap(), DocumentFormat::Office);
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        match DocumentFormat::from_filename("archive.xyz") {
            Err(ProcessError::UnsupportedFormat(ext)) => assert_eq!(ext, "xyz"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
        assert!(DocumentFormat::from_filename("noextension").is_err());
    }

    #[test]
    fn test_registry_reads_text_without_extension() {
        // stored files carry no extension
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3f2a9c");
        std::fs::write(&path, "Invoice 2024").unwrap();

        let text = registry().extract(&path, DocumentFormat::Text).unwrap();
        assert_eq!(text, "Invoice 2024");
    }

    #[test]
    fn test_registry_rejects_images_without_ocr() {
        let mut file = NamedTempFile::with_suffix(".png").unwrap();
        file.write_all(b"not really a png").unwrap();

        let err = registry()
            .extract(file.path(), DocumentFormat::Image)
            .unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_registry_rejects_office_without_pandoc() {
        let file = NamedTempFile::with_suffix(".docx").unwrap();
        let err = registry()
            .extract(file.path(), DocumentFormat::Office)
            .unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
    }
}
