/// Processing configuration threaded into the validator and the resizer.
///
/// Every component takes an explicit `ProcessingOptions` at construction; there is
/// no module-level default instance. Callers may override per call.

use serde::{Deserialize, Serialize};

/// Default maximum upload size: 5 MiB
pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Default bounding box edge for resized uploads
pub const DEFAULT_RESIZE_EDGE: u32 = 1024;

/// Bounding box and aspect policy for resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
    /// Fit inside the box keeping proportions (never upscales) when true,
    /// stretch to exactly `width`×`height` when false
    pub maintain_aspect_ratio: bool,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_RESIZE_EDGE,
            height: DEFAULT_RESIZE_EDGE,
            maintain_aspect_ratio: true,
        }
    }
}

impl ResizeOptions {
    /// Aspect-preserving square box, used for thumbnails
    pub fn square(edge: u32) -> Self {
        Self {
            width: edge,
            height: edge,
            maintain_aspect_ratio: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Maximum accepted input size in bytes
    pub max_size: u64,
    /// Accepted declared MIME types
    pub allowed_formats: Vec<String>,
    pub resize: ResizeOptions,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            allowed_formats: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
            resize: ResizeOptions::default(),
        }
    }
}

impl ProcessingOptions {
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_resize(mut self, resize: ResizeOptions) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_allowed_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// MIME comparison ignores case and any parameters (`image/jpeg; q=1`)
    pub fn allows(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_formats
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ProcessingOptions::default();
        assert_eq!(options.max_size, 5 * 1024 * 1024);
        assert_eq!(options.resize.width, 1024);
        assert_eq!(options.resize.height, 1024);
        assert!(options.resize.maintain_aspect_ratio);
        assert!(options.allows("image/webp"));
        assert!(!options.allows("image/gif"));
    }

    #[test]
    fn test_mime_parameters_ignored() {
        let options = ProcessingOptions::default();
        assert!(options.allows("IMAGE/JPEG; charset=binary"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options: ProcessingOptions = toml::from_str("max_size = 1024").unwrap();
        assert_eq!(options.max_size, 1024);
        assert_eq!(options.allowed_formats.len(), 3);
        assert_eq!(options.resize, ResizeOptions::default());
    }
}
