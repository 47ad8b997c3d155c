use std::path::Path;

use image::{ImageFormat, ImageReader};

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, ThumbnailGenerator};

/// Renders PNG thumbnails of image documents, bounded to `max_size` pixels
/// on the longer side.
#[derive(Debug, Clone)]
pub struct ImageThumbnailer {
    max_size: u32,
}

impl ImageThumbnailer {
    pub const DEFAULT_SIZE: u32 = 500;

    pub fn new(max_size: u32) -> Self {
        Self { max_size }
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl ThumbnailGenerator for ImageThumbnailer {
    fn generate(
        &self,
        source: &Path,
        format: DocumentFormat,
        target: &Path,
    ) -> Result<(), ProcessError> {
        let _span = tracing::info_span!("processor.thumbnail").entered();

        if format != DocumentFormat::Image {
            return Err(ProcessError::UnsupportedFormat(format!(
                "no thumbnail renderer for {:?}",
                format
            )));
        }

        let img = ImageReader::open(source)
            .map_err(|e| ProcessError::ReadDocument {
                path: source.to_path_buf(),
                source: e,
            })?
            .with_guessed_format()
            .map_err(|e| ProcessError::ReadDocument {
                path: source.to_path_buf(),
                source: e,
            })?
            .decode()
            .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProcessError::ReadDocument {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        img.thumbnail(self.max_size, self.max_size)
            .save_with_format(target, ImageFormat::Png)
            .map_err(|e| ProcessError::ImageProcessing(format!("Failed to save thumbnail: {}", e)))
    }
}
