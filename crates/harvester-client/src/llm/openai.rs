use std::time::Duration;

use harvester_core::error::AppError;
use harvester_core::traits::Extractor;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    DEFAULT_LLM_TIMEOUT, SYSTEM_PROMPT, api_failure, no_content, transport_error, user_prompt,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Chat-completions client for OpenAI and OpenAI-compatible APIs.
///
/// [`new`](Self::new) targets OpenAI with [`DEFAULT_MODEL`].
/// [`compatible`](Self::compatible) targets a self-hosted or third-party
/// endpoint and insists on an explicit base URL and model, since no default
/// is safe for an arbitrary server.
#[derive(Clone)]
pub struct OpenAiExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiExtractor {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::build(api_key, DEFAULT_MODEL, DEFAULT_BASE_URL, DEFAULT_LLM_TIMEOUT)
    }

    pub fn compatible(
        api_key: &str,
        base_url: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self, AppError> {
        let base_url = base_url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            AppError::ConfigError("Compatible provider requires an API base URL".into())
        })?;
        let model = model.filter(|m| !m.trim().is_empty()).ok_or_else(|| {
            AppError::ConfigError("Compatible provider requires a model name".into())
        })?;
        Self::build(api_key, model, base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout,
        })
    }

    fn chat_request(&self, content: &str, query: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt(content, query),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.0,
        }
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// The first choice's text; empty or null is a failure.
fn completion_text(response: ChatResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(no_content)
}

impl Extractor for OpenAiExtractor {
    async fn extract(&self, content: &str, query: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.chat_request(content, query))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(api_failure(response).await);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {e}")))?;

        completion_text(chat_response)
    }
}
