use std::future::Future;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{ClientResponse, ScrapeRequest};

/// One scraping backend (native fetch, Firecrawl, BrightData, ...).
///
/// Object safe so heterogeneous backends can sit in one
/// [`ScrapeClients`](crate::orchestrator::ScrapeClients) set. Ordinary
/// failures should come back as `Ok` with `success == false`; an `Err` is
/// treated the same way by the orchestrator.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ClientResponse, AppError>;
}

/// Converts raw HTML into clean Markdown text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Answers a natural-language query against text content using an LLM.
pub trait Extractor: Send + Sync + Clone {
    fn extract(
        &self,
        content: &str,
        query: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// An Extractor for when no LLM backend is configured.
#[derive(Debug, Clone)]
pub struct NullExtractor;

impl Extractor for NullExtractor {
    async fn extract(&self, _content: &str, _query: &str) -> Result<String, AppError> {
        Err(AppError::ConfigError(
            "No extraction capability available".into(),
        ))
    }
}
