use thiserror::Error;

/// Application-wide error types for Harvester.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Caller supplied a request that cannot be executed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No cached resource exists under the given URI.
    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    /// Cache backend I/O failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// Strategy hint table could not be read or written.
    #[error("Strategy config error: {0}")]
    StrategyConfigError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError { message: String, status_code: u16 },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn not_found(uri: impl Into<String>) -> Self {
        AppError::ResourceNotFound { uri: uri.into() }
    }

    /// Returns true if this error is transient and a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::LlmError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
