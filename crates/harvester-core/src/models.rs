use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::diagnostics::Diagnostics;
use crate::error::AppError;

/// One concrete scraping backend.
///
/// Variant order is the `cost` priority order and also the iteration order
/// of every per-strategy map in [`Diagnostics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Native,
    Firecrawl,
    #[serde(alias = "bright_data")]
    BrightData,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Native, Strategy::Firecrawl, Strategy::BrightData];

    /// Stable lowercase key used in diagnostics and persisted hint rows.
    pub fn key(&self) -> &'static str {
        match self {
            Strategy::Native => "native",
            Strategy::Firecrawl => "firecrawl",
            Strategy::BrightData => "brightdata",
        }
    }

    /// Human-facing backend name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Strategy::Native => "Native",
            Strategy::Firecrawl => "Firecrawl",
            Strategy::BrightData => "BrightData",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "fetch" | "native-fetch" => Ok(Strategy::Native),
            "firecrawl" => Ok(Strategy::Firecrawl),
            "brightdata" | "bright_data" | "bright-data" => Ok(Strategy::BrightData),
            other => Err(AppError::InvalidRequest(format!("Unknown strategy '{other}'"))),
        }
    }
}

/// A single acquisition request. Call-scoped.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    url: String,
    extract: Option<String>,
    timeout: Option<Duration>,
    strategy: Option<Strategy>,
    bypass_cache: bool,
}

impl ScrapeRequest {
    /// Create a request for `url`. The URL must be non-empty.
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(AppError::InvalidRequest("url must not be empty".into()));
        }
        Ok(Self {
            url,
            extract: None,
            timeout: None,
            strategy: None,
            bypass_cache: false,
        })
    }

    /// Natural-language query to run against the fetched content.
    pub fn with_extract(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.extract = (!query.trim().is_empty()).then_some(query);
        self
    }

    /// Upper bound applied to each strategy attempt individually.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Restrict the fallback chain to exactly one strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Skip cache lookups; results are still written to the cache.
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn extract(&self) -> Option<&str> {
        self.extract.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    pub fn is_cache_bypassed(&self) -> bool {
        self.bypass_cache
    }
}

/// Content returned by a scraping backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
}

impl ScrapedPage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: None,
            final_url: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Raw outcome of one backend call: `{success, status?, data?, error?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientResponse {
    pub success: bool,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub data: Option<ScrapedPage>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ClientResponse {
    pub fn ok(page: ScrapedPage) -> Self {
        Self {
            success: true,
            status: Some(200),
            data: Some(page),
            error: None,
        }
    }

    /// A failure carrying only an HTTP status code.
    pub fn status(status: u16) -> Self {
        Self {
            success: false,
            status: Some(status),
            data: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Error text for a failed call: the provided error, else `HTTP <status>`,
    /// else `HTTP unknown`.
    pub fn failure_text(&self) -> String {
        match (&self.error, self.status) {
            (Some(error), _) if !error.trim().is_empty() => error.clone(),
            (_, Some(status)) => format!("HTTP {status}"),
            _ => "HTTP unknown".to_string(),
        }
    }
}

/// Final outcome of one orchestrated acquisition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    pub source: Option<Strategy>,
    pub data: Option<ScrapedPage>,
    pub error: Option<String>,
    pub is_auth_error: bool,
    pub diagnostics: Diagnostics,
}

impl ScrapeResult {
    pub fn succeeded(source: Strategy, data: ScrapedPage, diagnostics: Diagnostics) -> Self {
        Self {
            success: true,
            source: Some(source),
            data: Some(data),
            error: None,
            is_auth_error: false,
            diagnostics,
        }
    }

    pub fn failed(error: String, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            source: None,
            data: None,
            error: Some(error),
            is_auth_error: false,
            diagnostics,
        }
    }

    pub fn auth_failed(source: Strategy, error: String, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            source: Some(source),
            data: None,
            error: Some(error),
            is_auth_error: true,
            diagnostics,
        }
    }
}

/// Result of an extraction call. Extraction never raises; failures are data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExtractionOutcome {
    Success { content: String },
    Failure { error: String },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Success { content } => Some(content),
            ExtractionOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Success { .. } => None,
            ExtractionOutcome::Failure { error } => Some(error),
        }
    }
}

impl From<Result<String, AppError>> for ExtractionOutcome {
    fn from(result: Result<String, AppError>) -> Self {
        match result {
            Ok(content) => ExtractionOutcome::Success { content },
            Err(e) => ExtractionOutcome::Failure {
                error: e.to_string(),
            },
        }
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_rejects_empty_url() {
        assert!(matches!(
            ScrapeRequest::new("   "),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_blank_extract_query_is_dropped() {
        let req = ScrapeRequest::new("https://example.com")
            .unwrap()
            .with_extract("  ");
        assert!(req.extract().is_none());
    }

    #[test]
    fn test_strategy_keys_round_trip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.key().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!(
            "Bright_Data".parse::<Strategy>().unwrap(),
            Strategy::BrightData
        );
        assert!("scrapingbee".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_failure_text_precedence() {
        assert_eq!(
            ClientResponse::failed("Rate limited")
                .with_status(429)
                .failure_text(),
            "Rate limited"
        );
        assert_eq!(ClientResponse::status(403).failure_text(), "HTTP 403");
        assert_eq!(ClientResponse::default().failure_text(), "HTTP unknown");
    }

    #[test]
    fn test_extraction_outcome_serializes_tagged() {
        let ok = ExtractionOutcome::Success {
            content: "Title".into(),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "success", "content": "Title"})
        );
        let err: ExtractionOutcome = Err(AppError::Generic("boom".into())).into();
        assert_eq!(err.error(), Some("boom"));
    }

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        assert_eq!(h1, compute_hash("hello world"));
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, compute_hash("hello"));
    }
}
