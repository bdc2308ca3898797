/// Image processing module
///
/// This module handles:
/// - Rejecting files by declared format and size before any decoding
/// - Decoding and resizing photos to the canonical upload size
/// - Re-encoding everything as JPEG
/// - Deriving gallery thumbnails from the resized image

pub mod options;
pub mod resizer;
pub mod thumbnail;
pub mod validator;

pub use options::{ProcessingOptions, ResizeOptions};
pub use resizer::{ImageResizer, ProcessedImage};
pub use thumbnail::ThumbnailGenerator;
pub use validator::validate;

/// An image file as picked by the user, before any processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original filename (e.g., "millennium-falcon.png")
    pub name: String,
    /// Declared MIME type (e.g., "image/png")
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
