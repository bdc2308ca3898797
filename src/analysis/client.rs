//! HTTP client for the image analysis endpoint

use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{debug, info};

use super::prompts::prompt_for;
use super::rate_limit::ApiRateLimiter;
use super::types::{AnalysisResponse, AnalysisResult, CollectionCategory};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::retry::{retry_with_backoff, RetryPolicy};

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    model_version: &'a str,
    category: CollectionCategory,
    prompt: String,
    /// Base64 of the processed image bytes
    image: String,
    mime_type: &'a str,
}

#[derive(Debug)]
pub struct AnalysisClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_version: String,
    retry: RetryPolicy,
    limiter: ApiRateLimiter,
}

impl AnalysisClient {
    /// Fails with `NotConfigured` when the endpoint or API key is missing
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        if !config.is_configured() {
            return Err(AnalysisError::NotConfigured);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("collection-vault/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| AnalysisError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.api_key.trim().to_string(),
            model_version: config.model_version.clone(),
            retry: RetryPolicy::default().with_max_attempts(config.max_retries),
            limiter: ApiRateLimiter::new(config.requests_per_minute, config.max_requests_per_day),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn limiter(&self) -> &ApiRateLimiter {
        &self.limiter
    }

    /// Identify the item in an image
    pub async fn analyze(
        &self,
        image: &[u8],
        mime_type: &str,
        category: CollectionCategory,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let request = AnalysisRequest {
            model_version: &self.model_version,
            category,
            prompt: prompt_for(category),
            image: STANDARD.encode(image),
            mime_type,
        };

        let response = retry_with_backoff(
            "image analysis",
            &self.retry,
            AnalysisError::is_retryable,
            |attempt| {
                let request = &request;
                async move {
                    // Every attempt counts against the quota
                    self.limiter.acquire().await?;
                    debug!(attempt, category = %category, "Sending analysis request");
                    self.send(request).await
                }
            },
        )
        .await?;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            category = %category,
            overall = response.confidence.overall,
            processing_time_ms,
            "Image analyzed"
        );

        Ok(AnalysisResult {
            metadata: response.metadata,
            confidence: response.confidence,
            processing_time_ms,
            model_version: self.model_version.clone(),
        })
    }

    async fn send(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisResponse, AnalysisError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AnalysisError::from_status(status.as_u16(), &body));
        }
        parse_response(&body)
    }
}

/// Parse the endpoint's answer. Models often wrap the JSON in a Markdown code
/// fence or surround it with prose, so only the outermost object is read.
pub(crate) fn parse_response(body: &str) -> Result<AnalysisResponse, AnalysisError> {
    let mut text = body.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(AnalysisError::Parse("response contains no JSON object".to_string()));
    };
    if end < start {
        return Err(AnalysisError::Parse("response contains no JSON object".to_string()));
    }

    serde_json::from_str(&text[start..=end]).map_err(|e| AnalysisError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"metadata": {"name": "Dune", "year": 1965},
        "confidence": {"overall": 0.9, "itemIdentification": 0.85}}"#;

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_response(BODY).unwrap();
        assert_eq!(parsed.metadata.name.as_deref(), Some("Dune"));
        assert_eq!(parsed.confidence.item_identification, 0.85);
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{BODY}\n```\n");
        let parsed = parse_response(&fenced).unwrap();
        assert_eq!(parsed.metadata.year, Some(1965));

        let chatty = format!("Here is the result:\n{BODY}\nHope this helps.");
        assert!(parse_response(&chatty).is_ok());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_response("I cannot identify this item."),
            Err(AnalysisError::Parse(_))
        ));
        assert!(matches!(parse_response("{not json}"), Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_unconfigured_client() {
        assert!(matches!(
            AnalysisClient::new(&AnalysisConfig::default()),
            Err(AnalysisError::NotConfigured)
        ));
    }
}
