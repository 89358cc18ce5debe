//! Sequential fallback across scraping strategies.
//!
//! Strategies are tried one at a time in priority order and never raced:
//! paid backends must not be billed speculatively, and the auth
//! short-circuit needs a deterministic sequence.
//!
//! ```text
//! order(mode, override, hint) -> [s1, s2, s3]
//!        |
//!        +-- no client for sN -> strategyErrors[sN] = "<Name> client not configured"
//!        |
//!        +-- s1.scrape() --ok--> return success (diagnostics so far)
//!              |
//!              +--auth phrase--> return isAuthError (no further attempts)
//!              |
//!              +--failure--> strategyErrors[s1] = err, try s2 ...
//!                                 |
//!                                 +--exhausted--> "All strategies failed. ..."
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use crate::auth::{AuthPhrases, auth_failure_message};
use crate::config::{OptimizeFor, OrchestratorConfig};
use crate::diagnostics::Diagnostics;
use crate::error::AppError;
use crate::models::{ClientResponse, ScrapeRequest, ScrapeResult, ScrapedPage, Strategy};
use crate::traits::ScrapeClient;

/// The capability set: zero or more configured scraping backends.
///
/// A missing backend is a valid configuration, not an error.
#[derive(Clone, Default)]
pub struct ScrapeClients {
    clients: BTreeMap<Strategy, Arc<dyn ScrapeClient>>,
}

impl ScrapeClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, strategy: Strategy, client: impl ScrapeClient + 'static) -> Self {
        self.with_shared(strategy, Arc::new(client))
    }

    pub fn with_shared(mut self, strategy: Strategy, client: Arc<dyn ScrapeClient>) -> Self {
        self.clients.insert(strategy, client);
        self
    }

    pub fn get(&self, strategy: Strategy) -> Option<&Arc<dyn ScrapeClient>> {
        self.clients.get(&strategy)
    }
}

/// How a single attempt ended, before auth classification.
enum AttemptOutcome {
    Succeeded(ScrapedPage),
    Failed(String),
}

/// Executes the fallback chain for one request at a time.
///
/// Holds only immutable settings; concurrent calls are independent.
#[derive(Debug, Clone, Default)]
pub struct StrategyOrchestrator {
    optimize_for: OptimizeFor,
    auth_phrases: AuthPhrases,
}

impl StrategyOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            optimize_for: config.optimize_for,
            auth_phrases: AuthPhrases::default(),
        }
    }

    pub fn with_auth_phrases(mut self, phrases: AuthPhrases) -> Self {
        self.auth_phrases = phrases;
        self
    }

    /// Base priority order for the configured mode.
    pub fn mode_order(&self) -> Vec<Strategy> {
        match self.optimize_for {
            OptimizeFor::Cost => vec![Strategy::Native, Strategy::Firecrawl, Strategy::BrightData],
            OptimizeFor::Speed => vec![Strategy::Firecrawl, Strategy::BrightData],
        }
    }

    /// Candidate order before availability filtering.
    ///
    /// A request override restricts the chain to that single strategy. A
    /// preferred strategy (from the hint table) moves to the front.
    pub fn candidate_order(
        &self,
        request: &ScrapeRequest,
        preferred: Option<Strategy>,
    ) -> Vec<Strategy> {
        if let Some(forced) = request.strategy() {
            return vec![forced];
        }

        let mut order = self.mode_order();
        if let Some(preferred) = preferred {
            order.retain(|s| *s != preferred);
            order.insert(0, preferred);
        }
        order
    }

    /// Run the fallback chain in mode order.
    pub async fn scrape_universal(
        &self,
        clients: &ScrapeClients,
        request: &ScrapeRequest,
    ) -> ScrapeResult {
        self.scrape_with_hint(clients, request, None).await
    }

    /// Run the fallback chain with `preferred` tried first.
    pub async fn scrape_with_hint(
        &self,
        clients: &ScrapeClients,
        request: &ScrapeRequest,
        preferred: Option<Strategy>,
    ) -> ScrapeResult {
        let mut diagnostics = Diagnostics::new();

        let mut candidates = Vec::new();
        for strategy in self.candidate_order(request, preferred) {
            match clients.get(strategy) {
                Some(client) => candidates.push((strategy, client)),
                None => {
                    tracing::debug!(%strategy, "Strategy not configured, skipping");
                    diagnostics.mark_unavailable(strategy);
                }
            }
        }

        for (strategy, client) in candidates {
            tracing::debug!(%strategy, url = %request.url(), "Attempting strategy");

            let started = Instant::now();
            let outcome = attempt(client.as_ref(), request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            diagnostics.record_attempt(strategy, elapsed_ms);

            let error = match outcome {
                AttemptOutcome::Succeeded(page) => {
                    tracing::info!(
                        %strategy,
                        url = %request.url(),
                        elapsed_ms,
                        bytes = page.content.len(),
                        "Strategy succeeded"
                    );
                    return ScrapeResult::succeeded(strategy, page, diagnostics);
                }
                AttemptOutcome::Failed(error) => error,
            };

            diagnostics.record_error(strategy, error.clone());

            if let Some(phrase) = self.auth_phrases.detect(strategy, &error) {
                tracing::warn!(
                    %strategy,
                    %phrase,
                    %error,
                    "Authentication failure, stopping fallback chain"
                );
                let message = auth_failure_message(strategy, &error);
                return ScrapeResult::auth_failed(strategy, message, diagnostics);
            }

            tracing::warn!(%strategy, elapsed_ms, %error, "Strategy failed, falling back");
        }

        let message = diagnostics.exhausted_message();
        tracing::warn!(url = %request.url(), "{message}");
        ScrapeResult::failed(message, diagnostics)
    }
}

/// Invoke one client, bounding it by the request timeout and converting
/// errors and panics into failure text.
async fn attempt(client: &dyn ScrapeClient, request: &ScrapeRequest) -> AttemptOutcome {
    let guarded = AssertUnwindSafe(client.scrape(request)).catch_unwind();

    let caught = match request.timeout() {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(caught) => caught,
            Err(_) => {
                let ms = limit.as_millis() as u64;
                return AttemptOutcome::Failed(AppError::Timeout(ms).to_string());
            }
        },
        None => guarded.await,
    };

    match caught {
        Ok(Ok(response)) => classify(response),
        Ok(Err(e)) => AttemptOutcome::Failed(e.to_string()),
        Err(payload) => AttemptOutcome::Failed(panic_message(payload)),
    }
}

fn classify(response: ClientResponse) -> AttemptOutcome {
    if !response.success {
        return AttemptOutcome::Failed(response.failure_text());
    }
    match response.data {
        Some(page) if !page.content.trim().is_empty() => AttemptOutcome::Succeeded(page),
        _ => AttemptOutcome::Failed("Empty content".to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown error".to_string()
    }
}
