//! Application configuration
//!
//! Read from a TOML file (`--config`, or `<config dir>/collection-vault/config.toml`).
//! A missing file means defaults. A few values can be overridden from the
//! environment, which wins over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::rate_limit::{DEFAULT_MAX_REQUESTS_PER_DAY, DEFAULT_REQUESTS_PER_MINUTE};
use crate::analysis::ConfidenceThresholds;
use crate::error::ConfigError;
use crate::pipeline::DEFAULT_MAX_IMAGES;
use crate::processing::thumbnail::THUMBNAIL_SIZE;
use crate::processing::resizer::JPEG_QUALITY;
use crate::processing::{ProcessingOptions, ResizeOptions};
use crate::retry::RetryPolicy;

pub const ENV_API_KEY: &str = "COLLECTION_VAULT_API_KEY";
pub const ENV_ENDPOINT: &str = "COLLECTION_VAULT_ENDPOINT";
pub const ENV_STORAGE_ROOT: &str = "COLLECTION_VAULT_STORAGE_ROOT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub processing: ProcessingConfig,
    pub upload: UploadConfig,
    pub gallery: GalleryConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Object store directory; defaults to the platform data dir
    pub root: Option<PathBuf>,
    /// Base URL objects are served from; `file://` URLs when unset
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_size: u64,
    pub allowed_formats: Vec<String>,
    pub resize: ResizeOptions,
    pub thumbnail_size: u32,
    pub jpeg_quality: u8,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let options = ProcessingOptions::default();
        Self {
            max_size: options.max_size,
            allowed_formats: options.allowed_formats,
            resize: options.resize,
            thumbnail_size: THUMBNAIL_SIZE,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl ProcessingConfig {
    pub fn options(&self) -> ProcessingOptions {
        ProcessingOptions::default()
            .with_max_size(self.max_size)
            .with_allowed_formats(self.allowed_formats.iter().cloned())
            .with_resize(self.resize)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_attempts: u32,
    pub put_timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            put_timeout_ms: 30_000,
        }
    }
}

impl UploadConfig {
    pub fn put_timeout(&self) -> Duration {
        Duration::from_millis(self.put_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_millis(250),
            ..RetryPolicy::default()
        }
        .with_max_attempts(self.max_attempts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub max_images: usize,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model_version: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// 0 disables the limit
    pub requests_per_minute: u32,
    /// 0 disables the quota
    pub max_requests_per_day: u32,
    pub thresholds: ConfidenceThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_version: "1.0".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_requests_per_day: DEFAULT_MAX_REQUESTS_PER_DAY,
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/collection-vault/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("collection-vault");
        path.push("config.toml");
        Some(path)
    }

    /// Load `path` (or the default path), apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match &path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration");
                Self::from_file(path)?
            }
            Some(path) => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Override values from the environment; blank values are ignored
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(ENV_API_KEY) {
            debug!("Analysis API key loaded from environment");
            self.analysis.api_key = key;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.analysis.endpoint = endpoint;
        }
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage.root = Some(PathBuf::from(root));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.allowed_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "processing.allowed_formats must not be empty".to_string(),
            ));
        }
        if self.processing.max_size == 0 {
            return Err(ConfigError::Invalid("processing.max_size must be positive".to_string()));
        }
        if self.processing.thumbnail_size == 0 {
            return Err(ConfigError::Invalid(
                "processing.thumbnail_size must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.processing.jpeg_quality) {
            return Err(ConfigError::Invalid(
                "processing.jpeg_quality must be between 1 and 100".to_string(),
            ));
        }
        if self.gallery.max_images == 0 {
            return Err(ConfigError::Invalid("gallery.max_images must be positive".to_string()));
        }
        Ok(())
    }
}
