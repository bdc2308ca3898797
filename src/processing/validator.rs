/// Pre-decode gate: rejects files by declared MIME type and byte size.
///
/// Runs before any decode so rejected input costs no CPU.

use super::{ImageFile, ProcessingOptions};
use crate::error::ValidationError;

/// Check `file` against `options`. The format check comes first.
pub fn validate(file: &ImageFile, options: &ProcessingOptions) -> Result<(), ValidationError> {
    if !options.allows(&file.mime_type) {
        return Err(ValidationError::UnsupportedFormat {
            mime_type: file.mime_type.clone(),
            allowed: options.allowed_formats.join(", "),
        });
    }

    if file.size() > options.max_size {
        return Err(ValidationError::SizeExceeded {
            size: file.size(),
            max_size: options.max_size,
        });
    }

    Ok(())
}
