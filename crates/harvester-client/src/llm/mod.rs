//! LLM extraction providers.
//!
//! [`ExtractionService`] is the single entry point: a closed set of
//! providers selected by [`LlmProvider`], each answering a natural-language
//! query against page content.

pub mod anthropic;
pub mod openai;

use std::time::Duration;

use harvester_core::config::{LlmConfig, LlmProvider};
use harvester_core::error::AppError;
use harvester_core::models::ExtractionOutcome;
use harvester_core::traits::Extractor;
use serde::Deserialize;

pub use anthropic::AnthropicExtractor;
pub use openai::OpenAiExtractor;

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);
const SYSTEM_PROMPT: &str = "You are a precise extraction assistant. \
    Answer the query using only the provided web content. \
    If the content does not contain the answer, say so briefly. \
    Do not add commentary.";

fn user_prompt(content: &str, query: &str) -> String {
    format!("Query: {query}\n\nWeb content:\n\n{content}")
}

fn no_content() -> AppError {
    AppError::LlmError {
        message: "No content extracted".into(),
        status_code: 200,
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout.as_millis() as u64)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Both vendors wrap failures as `{"error": {"message": ...}}`.
#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn failure_message(status_code: u16, body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"))
}

async fn api_failure(response: reqwest::Response) -> AppError {
    let status_code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AppError::LlmError {
        message: failure_message(status_code, &body),
        status_code,
    }
}

/// Uniform extraction over the configured provider.
#[derive(Clone)]
pub enum ExtractionService {
    Anthropic(AnthropicExtractor),
    OpenAi(OpenAiExtractor),
    /// Self-hosted or third-party OpenAI-compatible endpoint.
    Compatible(OpenAiExtractor),
}

impl ExtractionService {
    /// Build the provider named by `config`.
    ///
    /// Fails if `compatible` is selected without both a base URL and a model.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AppError> {
        let service = match config.provider {
            LlmProvider::Anthropic => {
                let mut extractor = AnthropicExtractor::new(&config.api_key)?;
                if let Some(model) = &config.model {
                    extractor = extractor.with_model(model);
                }
                if let Some(base_url) = &config.api_base_url {
                    extractor = extractor.with_base_url(base_url);
                }
                ExtractionService::Anthropic(extractor)
            }
            LlmProvider::OpenAi => {
                let mut extractor = OpenAiExtractor::new(&config.api_key)?;
                if let Some(model) = &config.model {
                    extractor = extractor.with_model(model);
                }
                if let Some(base_url) = &config.api_base_url {
                    extractor = extractor.with_base_url(base_url);
                }
                ExtractionService::OpenAi(extractor)
            }
            LlmProvider::Compatible => ExtractionService::Compatible(OpenAiExtractor::compatible(
                &config.api_key,
                config.api_base_url.as_deref(),
                config.model.as_deref(),
            )?),
        };
        tracing::info!(
            provider = %service.provider(),
            model = %service.model(),
            "Extraction enabled"
        );
        Ok(service)
    }

    /// Build from `LLM_*` environment variables, or `None` when they do not
    /// name both a provider and a key.
    pub fn from_env() -> Result<Option<Self>, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, AppError> {
        match LlmConfig::from_lookup(lookup)? {
            Some(config) => Self::from_config(&config).map(Some),
            None => {
                tracing::info!("No extraction capability available");
                Ok(None)
            }
        }
    }

    pub fn provider(&self) -> LlmProvider {
        match self {
            ExtractionService::Anthropic(_) => LlmProvider::Anthropic,
            ExtractionService::OpenAi(_) => LlmProvider::OpenAi,
            ExtractionService::Compatible(_) => LlmProvider::Compatible,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ExtractionService::Anthropic(e) => e.model(),
            ExtractionService::OpenAi(e) | ExtractionService::Compatible(e) => e.model(),
        }
    }

    /// Answer `query` against `content`. Never fails: provider errors are
    /// returned as [`ExtractionOutcome::Failure`].
    pub async fn extract(&self, content: &str, query: &str) -> ExtractionOutcome {
        let result = self.complete(content, query).await;
        if let Err(e) = &result {
            tracing::warn!(
                provider = %self.provider(),
                retryable = e.is_retryable(),
                error = %e,
                "Extraction failed"
            );
        }
        result.into()
    }

    async fn complete(&self, content: &str, query: &str) -> Result<String, AppError> {
        match self {
            ExtractionService::Anthropic(e) => e.extract(content, query).await,
            ExtractionService::OpenAi(e) | ExtractionService::Compatible(e) => {
                e.extract(content, query).await
            }
        }
    }
}

impl Extractor for ExtractionService {
    async fn extract(&self, content: &str, query: &str) -> Result<String, AppError> {
        self.complete(content, query).await
    }
}
