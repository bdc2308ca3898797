//! Auto-fill of item details from a photo via a remote inference endpoint

pub mod client;
pub mod prompts;
pub mod rate_limit;
pub mod types;

pub use client::AnalysisClient;
pub use prompts::prompt_for;
pub use rate_limit::ApiRateLimiter;
pub use types::{
    AnalysisResult, CollectionCategory, ConfidenceScore, ConfidenceThresholds, ItemMetadata,
};
