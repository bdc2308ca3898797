use image::ImageFormat;
use tracing::debug;

use super::{resizer::resize_and_encode, ProcessedImage, ResizeOptions};
use crate::error::ProcessingError;

/// Size of generated thumbnails (square bounding box)
pub const THUMBNAIL_SIZE: u32 = 256;

/// Derives gallery thumbnails from already-resized images
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailGenerator {
    size: u32,
    quality: u8,
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new(THUMBNAIL_SIZE)
    }
}

impl ThumbnailGenerator {
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(1),
            quality: super::resizer::JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Generate a thumbnail for a processed image
    pub async fn thumbnail(&self, processed: &ProcessedImage) -> Result<Vec<u8>, ProcessingError> {
        let bytes = processed.bytes.clone();
        let generator = *self;

        tokio::task::spawn_blocking(move || generator.thumbnail_blocking(&bytes))
            .await
            .map_err(|e| ProcessingError::Task(e.to_string()))?
    }

    /// Blocking version of thumbnail generation
    pub fn thumbnail_blocking(&self, jpeg_data: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        // Processed images are always JPEG
        let img = image::load_from_memory_with_format(jpeg_data, ImageFormat::Jpeg)
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        let (bytes, width, height) =
            resize_and_encode(&img, &ResizeOptions::square(self.size), self.quality)?;

        debug!(width, height, bytes = bytes.len(), "Generated thumbnail");
        Ok(bytes)
    }
}
