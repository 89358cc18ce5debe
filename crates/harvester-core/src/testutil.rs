//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration tests.
//! All mocks use `Arc<Mutex<_>>` (or atomics) so clones share state and
//! tests can assert on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{ClientResponse, ScrapeRequest, ScrapedPage};
use crate::traits::{Cleaner, Extractor, ScrapeClient};

// ---------------------------------------------------------------------------
// MockScrapeClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum PanicPayload {
    Message(String),
    Opaque,
}

/// Mock scraping backend with a scripted response queue.
#[derive(Clone)]
pub struct MockScrapeClient {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default successful page.
    responses: Arc<Mutex<Vec<Result<ClientResponse, AppError>>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    panic: Option<PanicPayload>,
}

impl MockScrapeClient {
    pub fn with_responses(responses: Vec<Result<ClientResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
            panic: None,
        }
    }

    pub fn succeeding(content: &str) -> Self {
        Self::with_responses(vec![Ok(ClientResponse::ok(ScrapedPage::new(content)))])
    }

    /// Fails with only an HTTP status code.
    pub fn with_status(status: u16) -> Self {
        Self::with_responses(vec![Ok(ClientResponse::status(status))])
    }

    /// Fails with the given error text in the response body.
    pub fn with_error_text(error: &str) -> Self {
        Self::with_responses(vec![Ok(ClientResponse::failed(error))])
    }

    /// Fails by returning `Err`.
    pub fn with_app_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    /// Panics when called: with a string message, or with a non-string
    /// payload when `message` is `None`.
    pub fn panicking(message: Option<&str>) -> Self {
        let mut mock = Self::with_responses(Vec::new());
        mock.panic = Some(match message {
            Some(msg) => PanicPayload::Message(msg.to_string()),
            None => PanicPayload::Opaque,
        });
        mock
    }

    /// Sleep before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `scrape` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScrapeClient for MockScrapeClient {
    async fn scrape(&self, _request: &ScrapeRequest) -> Result<ClientResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.panic {
            Some(PanicPayload::Message(msg)) => panic!("{msg}"),
            Some(PanicPayload::Opaque) => std::panic::panic_any(42_u32),
            None => {}
        }

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        next.unwrap_or_else(|| Ok(ClientResponse::ok(ScrapedPage::new("<html>default</html>"))))
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that applies a simple transformation.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner that returns an error once.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns configurable answers and records queries.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    /// Recorded `(content, query)` pairs.
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockExtractor {
    pub fn new(answer: &str) -> Self {
        Self::with_responses(vec![Ok(answer.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Extractor for MockExtractor {
    async fn extract(&self, content: &str, query: &str) -> Result<String, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((content.to_string(), query.to_string()));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("default answer".to_string())
        } else {
            responses.remove(0)
        }
    }
}
