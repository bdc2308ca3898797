//! Error types for collection-vault
//!
//! One enum per concern. Validation and decode failures are user-correctable and
//! never retried. Store failures carry enough to let callers pick a retry policy.
//! Migration failures carry the partial result.

use thiserror::Error;

use crate::storage::ObjectPath;

/// Pre-decode rejection of an input file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported image format `{mime_type}` (allowed: {allowed})")]
    UnsupportedFormat { mime_type: String, allowed: String },

    #[error("image is {size} bytes, exceeding the maximum of {max_size} bytes")]
    SizeExceeded { size: u64, max_size: u64 },
}

/// Failure anywhere in validate → decode → resize → encode
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    /// The blocking image task panicked or was cancelled
    #[error("image task failed: {0}")]
    Task(String),
}

/// Object store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient: I/O error, timeout, backend down
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    #[error("object not found: {0}")]
    NotFound(String),

    /// Malformed path or a URL that does not belong to this store
    #[error("invalid object path: {0}")]
    InvalidPath(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// A draft → item migration that stopped part way.
///
/// Objects listed in `migrated` already live in the permanent namespace. The rest are
/// still in the draft namespace, so running the migration again finishes the job.
#[derive(Debug, Error)]
#[error("migration stopped at {failed} after {} object(s): {source}", migrated.len())]
pub struct MigrationError {
    /// Permanent URLs of the objects moved before the failure, in enumeration order
    pub migrated: Vec<String>,
    /// The object whose copy or delete failed
    pub failed: ObjectPath,
    #[source]
    pub source: StoreError,
}

/// Failure of a single file's upload chain
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("upload failed: {0}")]
    Store(#[from] StoreError),

    #[error("gallery already holds the maximum of {max} images")]
    GalleryFull { max: usize },

    /// Stored, but not accepted into the item's gallery; the object was removed again
    #[error("image was not added to the gallery: {0}")]
    Gallery(#[source] GalleryError),
}

/// Document store failures
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The connection mutex was poisoned by a panicking writer
    #[error("catalog connection unavailable")]
    Poisoned,
}

/// Gallery editing failures
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery already holds the maximum of {max} images")]
    Full { max: usize },

    /// The URL does not resolve into the item's own namespace
    #[error("image {url} does not belong to this item")]
    NotOwned { url: String },

    /// Phase two of a commit: the record write failed after deletes ran
    #[error("failed to persist image list: {0}")]
    Persist(#[from] CatalogError),
}

/// Remote inference failures
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis endpoint is not configured")]
    NotConfigured,

    #[error("rate limit exceeded, try again in a minute")]
    RateLimited,

    #[error("daily quota of {limit} requests exceeded, try again tomorrow")]
    QuotaExceeded { limit: u32 },

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("analysis service error (status {0})")]
    Server(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("analysis request timed out")]
    Timeout,

    #[error("could not parse analysis response: {0}")]
    Parse(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl AnalysisError {
    /// Rate limits, server errors, network errors and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited
                | AnalysisError::Server(_)
                | AnalysisError::Network(_)
                | AnalysisError::Timeout
        )
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => AnalysisError::RateLimited,
            401 | 403 => AnalysisError::InvalidApiKey,
            400 => AnalysisError::InvalidRequest(body.to_string()),
            s if s >= 500 => AnalysisError::Server(s),
            s => AnalysisError::InvalidRequest(format!("unexpected status {s}: {body}")),
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Timeout
        } else if err.is_decode() {
            AnalysisError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            AnalysisError::from_status(status.as_u16(), "")
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}

/// Failures of the collection facade, which drives several stores at once
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Gallery(#[from] GalleryError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
