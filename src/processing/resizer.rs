/// Canonical upload image generation
/// Decodes any supported input, fits it to the configured box and re-encodes as JPEG
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use tracing::debug;

use super::{validate, ImageFile, ProcessingOptions, ResizeOptions};
use crate::error::ProcessingError;

/// JPEG quality factor for every encoded output (0.9)
pub const JPEG_QUALITY: u8 = 90;

/// MIME type of every processed image
pub const OUTPUT_FORMAT: &str = "image/jpeg";

/// Result of resizing: the re-encoded bytes and their dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Always `image/jpeg`
    pub format: String,
    /// Size of the input file in bytes
    pub original_size: u64,
}

impl ProcessedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Compute the output size for a `src_width`×`src_height` source.
///
/// Aspect-preserving mode scales down to fit inside the box and never scales up.
/// Exact mode returns the box itself. A zero box edge means "unbounded" on that axis.
/// Results are rounded to the nearest pixel and never below 1.
pub fn target_dimensions(src_width: u32, src_height: u32, resize: &ResizeOptions) -> (u32, u32) {
    let src_width = src_width.max(1);
    let src_height = src_height.max(1);

    if !resize.maintain_aspect_ratio {
        let width = if resize.width == 0 { src_width } else { resize.width };
        let height = if resize.height == 0 { src_height } else { resize.height };
        return (width, height);
    }

    let scale_for = |bound: u32, src: u32| {
        if bound == 0 {
            f64::INFINITY
        } else {
            f64::from(bound) / f64::from(src)
        }
    };
    let ratio = scale_for(resize.width, src_width)
        .min(scale_for(resize.height, src_height))
        .min(1.0);

    let scale = |src: u32| ((f64::from(src) * ratio).round() as u32).max(1);
    (scale(src_width), scale(src_height))
}

/// Resize a decoded image per `resize` and encode it as JPEG
pub(crate) fn resize_and_encode(
    img: &DynamicImage,
    resize: &ResizeOptions,
    quality: u8,
) -> Result<(Vec<u8>, u32, u32), ProcessingError> {
    let (width, height) = target_dimensions(img.width(), img.height(), resize);

    let resized = if (width, height) == (img.width(), img.height()) {
        img.clone()
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let bytes = encode_jpeg(&resized, quality)?;
    Ok((bytes, width, height))
}

/// Encode as baseline RGB JPEG; alpha is dropped
pub(crate) fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let rgb = img.to_rgb8();
    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| ProcessingError::Encode(e.to_string()))?;
    }
    Ok(bytes)
}

/// Blocking version of the resize
pub fn resize_blocking(
    bytes: &[u8],
    resize: &ResizeOptions,
    quality: u8,
) -> Result<ProcessedImage, ProcessingError> {
    let img =
        image::load_from_memory(bytes).map_err(|e| ProcessingError::Decode(e.to_string()))?;

    let (encoded, width, height) = resize_and_encode(&img, resize, quality)?;

    debug!(
        src_width = img.width(),
        src_height = img.height(),
        width,
        height,
        bytes = encoded.len(),
        "Resized image"
    );

    Ok(ProcessedImage {
        bytes: encoded,
        width,
        height,
        format: OUTPUT_FORMAT.to_string(),
        original_size: bytes.len() as u64,
    })
}

/// Validates and resizes uploads with a fixed set of options
#[derive(Debug, Clone)]
pub struct ImageResizer {
    options: ProcessingOptions,
    quality: u8,
}

impl ImageResizer {
    pub fn new(options: ProcessingOptions) -> Self {
        Self {
            options,
            quality: JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    /// Validate then resize with this resizer's options
    pub async fn process(&self, file: &ImageFile) -> Result<ProcessedImage, ProcessingError> {
        self.process_with(file, &self.options).await
    }

    /// Validate then resize with per-call options
    pub async fn process_with(
        &self,
        file: &ImageFile,
        options: &ProcessingOptions,
    ) -> Result<ProcessedImage, ProcessingError> {
        validate(file, options)?;
        self.resize_with(file, &options.resize).await
    }

    /// Decode and resize without validation
    pub async fn resize(&self, file: &ImageFile) -> Result<ProcessedImage, ProcessingError> {
        self.resize_with(file, &self.options.resize).await
    }

    async fn resize_with(
        &self,
        file: &ImageFile,
        resize: &ResizeOptions,
    ) -> Result<ProcessedImage, ProcessingError> {
        let bytes = file.bytes.clone();
        let resize = *resize;
        let quality = self.quality;

        // Decoding is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || resize_blocking(&bytes, &resize, quality))
            .await
            .map_err(|e| ProcessingError::Task(e.to_string()))?
    }
}
