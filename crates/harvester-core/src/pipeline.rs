use serde::Serialize;

use crate::cache::{Resource, ResourceKind, ResourceStore, ResourceWrite, WrittenResource};
use crate::error::AppError;
use crate::models::{ExtractionOutcome, ScrapeRequest, ScrapeResult, Strategy};
use crate::orchestrator::{ScrapeClients, StrategyOrchestrator};
use crate::strategy_config::{StrategyConfigEntry, StrategyConfigStore, extract_url_pattern};
use crate::traits::{Cleaner, Extractor};

/// What one harvest produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestOutcome {
    pub url: String,
    /// Extracted answer when extraction succeeded, otherwise the cleaned
    /// (or raw) page content. `None` when acquisition failed.
    pub content: Option<String>,
    pub representation: Option<ResourceKind>,
    pub from_cache: bool,
    /// Orchestration result; absent when no scrape was needed.
    pub scrape: Option<ScrapeResult>,
    pub extraction: Option<ExtractionOutcome>,
    /// Resources written during this harvest.
    pub written: Vec<WrittenResource>,
}

impl HarvestOutcome {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            content: None,
            representation: None,
            from_cache: false,
            scrape: None,
            extraction: None,
            written: Vec::new(),
        }
    }

    fn serve(mut self, resource: &Resource) -> Self {
        self.content = Some(resource.content.clone());
        self.representation = Some(resource.kind());
        self
    }

    pub fn is_success(&self) -> bool {
        self.content.is_some()
    }
}

/// Orchestrates the full acquisition pipeline:
/// cache lookup → fallback scrape → clean → cache → extract → cache → learn.
///
/// Generic over all external dependencies via traits, enabling dependency
/// injection and testability without real HTTP or LLM calls.
pub struct HarvestService<C, E, S>
where
    C: Cleaner,
    E: Extractor,
    S: ResourceStore,
{
    orchestrator: StrategyOrchestrator,
    cleaner: C,
    extractor: Option<E>,
    cache: S,
    hints: Option<StrategyConfigStore>,
}

impl<C, E, S> HarvestService<C, E, S>
where
    C: Cleaner,
    E: Extractor,
    S: ResourceStore,
{
    /// Create a service without extraction or strategy hints.
    pub fn new(orchestrator: StrategyOrchestrator, cleaner: C, cache: S) -> Self {
        Self {
            orchestrator,
            cleaner,
            extractor: None,
            cache,
            hints: None,
        }
    }

    pub fn with_extractor(mut self, extractor: E) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Read ordering hints from, and record learned hints into, `store`.
    pub fn with_strategy_store(mut self, store: StrategyConfigStore) -> Self {
        self.hints = Some(store);
        self
    }

    pub fn cache(&self) -> &S {
        &self.cache
    }

    /// Run the pipeline for one request.
    ///
    /// 1. Serve from cache when a matching resource exists
    /// 2. Otherwise run the fallback chain, biased by any stored hint
    /// 3. Clean and cache raw + cleaned content
    /// 4. Remember the winning strategy if fallback was needed
    /// 5. Extract (if requested) and cache the answer with its prompt
    ///
    /// Errors are returned only for cache I/O; acquisition and extraction
    /// failures are reported inside the outcome.
    pub async fn harvest(
        &self,
        clients: &ScrapeClients,
        request: &ScrapeRequest,
    ) -> Result<HarvestOutcome, AppError> {
        let url = request.url();
        let query = request.extract();
        let outcome = HarvestOutcome::new(url);

        // 1. Cache
        if !request.is_cache_bypassed() {
            if let Some(query) = query {
                let cached = self.cache.find_by_url_and_extract(url, Some(query)).await?;
                if let Some(hit) = cached.iter().find(|r| r.kind() == ResourceKind::Extracted) {
                    tracing::info!(%url, uri = %hit.uri, "Serving cached extraction");
                    let mut outcome = outcome.serve(hit);
                    outcome.from_cache = true;
                    outcome.extraction = Some(ExtractionOutcome::Success {
                        content: hit.content.clone(),
                    });
                    return Ok(outcome);
                }
            }

            let plain = self.cache.find_by_url_and_extract(url, None).await?;
            if let Some(hit) = latest_page(&plain) {
                tracing::info!(%url, uri = %hit.uri, kind = %hit.kind(), "Serving cached page");
                let page = hit.content.clone();
                let mut outcome = outcome.serve(hit);
                outcome.from_cache = true;
                if let Some(query) = query {
                    outcome = self.run_extraction(outcome, url, &page, query).await?;
                }
                return Ok(outcome);
            }
        }

        // 2. Scrape
        let preferred = self.preferred_strategy(url).await;
        let result = self
            .orchestrator
            .scrape_with_hint(clients, request, preferred)
            .await;

        let (true, Some(source), Some(page)) = (result.success, result.source, result.data.clone())
        else {
            let mut outcome = outcome;
            outcome.scrape = Some(result);
            return Ok(outcome);
        };

        // 3. Clean + cache
        let cleaned = match self.cleaner.clean(&page.content) {
            Ok(cleaned) => {
                tracing::info!(
                    "Cleaned {} bytes to {} bytes",
                    page.content.len(),
                    cleaned.len()
                );
                Some(cleaned)
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "Cleaning failed, keeping raw content only");
                None
            }
        };

        let mut write = ResourceWrite::new(url)
            .raw(page.content.clone())
            .extra("source", serde_json::Value::from(source.key()));
        if let Some(content_type) = &page.content_type {
            write = write.content_type(content_type.clone());
        }
        if let Some(cleaned) = &cleaned {
            write = write.cleaned(cleaned.clone());
        }
        let written = self.cache.write_multi(write).await?;

        let mut outcome = outcome;
        outcome.written = written;
        outcome.content = Some(cleaned.clone().unwrap_or_else(|| page.content.clone()));
        outcome.representation = Some(if cleaned.is_some() {
            ResourceKind::Cleaned
        } else {
            ResourceKind::Raw
        });

        // 4. Learn
        self.learn(url, source, preferred, &result).await;
        outcome.scrape = Some(result);

        // 5. Extract
        if let Some(query) = query {
            let text = cleaned.unwrap_or(page.content);
            outcome = self.run_extraction(outcome, url, &text, query).await?;
        }

        Ok(outcome)
    }

    async fn run_extraction(
        &self,
        mut outcome: HarvestOutcome,
        url: &str,
        content: &str,
        query: &str,
    ) -> Result<HarvestOutcome, AppError> {
        let extraction: ExtractionOutcome = match &self.extractor {
            Some(extractor) => {
                tracing::info!(%url, %query, "Extracting");
                extractor.extract(content, query).await.into()
            }
            None => ExtractionOutcome::Failure {
                error: "No extraction capability available".to_string(),
            },
        };

        match &extraction {
            ExtractionOutcome::Success { content: answer } => {
                let written = self
                    .cache
                    .write_multi(
                        ResourceWrite::new(url)
                            .extracted(answer.clone())
                            .extraction_prompt(query),
                    )
                    .await?;
                outcome.written.extend(written);
                outcome.content = Some(answer.clone());
                outcome.representation = Some(ResourceKind::Extracted);
            }
            ExtractionOutcome::Failure { error } => {
                tracing::warn!(%url, %query, %error, "Extraction failed");
            }
        }
        outcome.extraction = Some(extraction);
        Ok(outcome)
    }

    async fn preferred_strategy(&self, url: &str) -> Option<Strategy> {
        let store = self.hints.as_ref()?;
        match store.find_for_url(url).await {
            Ok(entry) => entry.map(|e| {
                tracing::debug!(
                    %url,
                    prefix = %e.prefix,
                    strategy = %e.default_strategy,
                    "Using strategy hint"
                );
                e.default_strategy
            }),
            Err(e) => {
                tracing::warn!(%url, error = %e, "Strategy hints unavailable");
                None
            }
        }
    }

    /// Record the winning strategy when earlier candidates had to fail first.
    async fn learn(
        &self,
        url: &str,
        source: Strategy,
        preferred: Option<Strategy>,
        result: &ScrapeResult,
    ) {
        let Some(store) = &self.hints else {
            return;
        };
        let attempted = &result.diagnostics.strategies_attempted;
        if attempted.len() < 2 || preferred == Some(source) {
            return;
        }

        let failed: Vec<&str> = attempted
            .iter()
            .filter(|s| **s != source)
            .map(Strategy::key)
            .collect();
        let prefix = extract_url_pattern(url);
        let entry = StrategyConfigEntry::new(
            prefix.clone(),
            source,
            format!("learned: {} failed", failed.join(", ")),
        );

        match store.upsert_entry(entry).await {
            Ok(()) => tracing::info!(%prefix, strategy = %source, "Learned strategy hint"),
            Err(e) => tracing::warn!(%prefix, error = %e, "Failed to record strategy hint"),
        }
    }
}

/// Newest cleaned page, else newest raw page.
fn latest_page(resources: &[Resource]) -> Option<&Resource> {
    resources
        .iter()
        .find(|r| r.kind() == ResourceKind::Cleaned)
        .or_else(|| resources.iter().find(|r| r.kind() == ResourceKind::Raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::models::{ClientResponse, ScrapedPage};
    use crate::testutil::*;
    use crate::traits::NullExtractor;

    const URL: &str = "https://example.com/docs/page";

    fn clients(native: MockScrapeClient) -> ScrapeClients {
        ScrapeClients::new().with(Strategy::Native, native)
    }

    fn service(
        extractor: MockExtractor,
    ) -> HarvestService<MockCleaner, MockExtractor, MemoryStore> {
        HarvestService::new(
            StrategyOrchestrator::default(),
            MockCleaner::passthrough(),
            MemoryStore::new(),
        )
        .with_extractor(extractor)
    }

    #[tokio::test]
    async fn happy_path_caches_raw_and_cleaned() {
        let svc = HarvestService::<_, NullExtractor, _>::new(
            StrategyOrchestrator::default(),
            MockCleaner::passthrough(),
            MemoryStore::new(),
        );
        let request = ScrapeRequest::new(URL).unwrap();

        let outcome = svc
            .harvest(&clients(MockScrapeClient::succeeding("<p>hi</p>")), &request)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(!outcome.from_cache);
        assert_eq!(outcome.content.as_deref(), Some("<p>hi</p>"));
        assert_eq!(outcome.representation, Some(ResourceKind::Cleaned));
        assert_eq!(outcome.written.len(), 2);
        assert_eq!(outcome.scrape.unwrap().source, Some(Strategy::Native));

        let raw = svc.cache().read(&outcome.written[0].uri).await.unwrap();
        assert_eq!(raw.metadata.extra["source"], "native");
    }

    #[tokio::test]
    async fn extraction_answer_is_cached_with_prompt() {
        let extractor = MockExtractor::new("Docs Page");
        let svc = service(extractor.clone());
        let request = ScrapeRequest::new(URL)
            .unwrap()
            .with_extract("get the title");

        let outcome = svc
            .harvest(&clients(MockScrapeClient::succeeding("<h1>Docs Page</h1>")), &request)
            .await
            .unwrap();

        assert_eq!(outcome.content.as_deref(), Some("Docs Page"));
        assert_eq!(outcome.representation, Some(ResourceKind::Extracted));
        assert!(outcome.extraction.unwrap().is_success());
        assert_eq!(outcome.written.len(), 3);

        let cached = svc
            .cache()
            .find_by_url_and_extract(URL, Some("get the title"))
            .await
            .unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content, "Docs Page");
        assert_eq!(extractor.calls.lock().unwrap()[0].1, "get the title");
    }

    #[tokio::test]
    async fn repeat_request_is_served_from_cache() {
        let extractor = MockExtractor::new("Docs Page");
        let svc = service(extractor.clone());
        let native = MockScrapeClient::succeeding("<h1>Docs Page</h1>");
        let clients = clients(native.clone());
        let request = ScrapeRequest::new(URL)
            .unwrap()
            .with_extract("get the title");

        svc.harvest(&clients, &request).await.unwrap();
        let second = svc.harvest(&clients, &request).await.unwrap();

        assert!(second.from_cache);
        assert!(second.scrape.is_none());
        assert_eq!(second.content.as_deref(), Some("Docs Page"));
        assert_eq!(native.calls(), 1);
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn new_query_reuses_cached_page() {
        let extractor =
            MockExtractor::with_responses(vec![Ok("Docs Page".into()), Ok("none".into())]);
        let svc = service(extractor.clone());
        let native = MockScrapeClient::succeeding("<h1>Docs Page</h1>");
        let clients = clients(native.clone());

        let first = ScrapeRequest::new(URL).unwrap().with_extract("get the title");
        svc.harvest(&clients, &first).await.unwrap();

        let second = ScrapeRequest::new(URL).unwrap().with_extract("find emails");
        let outcome = svc.harvest(&clients, &second).await.unwrap();

        assert!(outcome.from_cache);
        assert_eq!(outcome.content.as_deref(), Some("none"));
        assert_eq!(native.calls(), 1);
        assert_eq!(extractor.call_count(), 2);
    }

    #[tokio::test]
    async fn bypass_cache_forces_a_scrape() {
        let svc = service(MockExtractor::new("unused"));
        let native = MockScrapeClient::with_responses(vec![
            Ok(ClientResponse::ok(ScrapedPage::new("v1"))),
            Ok(ClientResponse::ok(ScrapedPage::new("v2"))),
        ]);
        let clients = clients(native.clone());

        svc.harvest(&clients, &ScrapeRequest::new(URL).unwrap())
            .await
            .unwrap();
        let outcome = svc
            .harvest(&clients, &ScrapeRequest::new(URL).unwrap().bypass_cache())
            .await
            .unwrap();

        assert_eq!(outcome.content.as_deref(), Some("v2"));
        assert_eq!(native.calls(), 2);
        let latest = svc.cache().find_by_url_and_extract(URL, None).await.unwrap();
        assert_eq!(latest[0].content, "v2");
    }

    #[tokio::test]
    async fn failed_scrape_writes_nothing() {
        let svc = service(MockExtractor::new("unused"));
        let request = ScrapeRequest::new(URL).unwrap();

        let outcome = svc
            .harvest(&clients(MockScrapeClient::with_status(503)), &request)
            .await
            .unwrap();

        assert!(!outcome.is_success());
        let scrape = outcome.scrape.unwrap();
        assert!(!scrape.success);
        assert_eq!(scrape.diagnostics.error_for(Strategy::Native), Some("HTTP 503"));
        assert!(svc.cache().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_keeps_page_content() {
        let svc = service(MockExtractor::with_error(AppError::LlmError {
            message: "overloaded".into(),
            status_code: 529,
        }));
        let request = ScrapeRequest::new(URL).unwrap().with_extract("summarize");

        let outcome = svc
            .harvest(&clients(MockScrapeClient::succeeding("body")), &request)
            .await
            .unwrap();

        assert_eq!(outcome.content.as_deref(), Some("body"));
        assert_eq!(outcome.representation, Some(ResourceKind::Cleaned));
        let extraction = outcome.extraction.unwrap();
        assert!(extraction.error().unwrap().contains("overloaded"));
        assert!(
            svc.cache()
                .find_by_url_and_extract(URL, Some("summarize"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn missing_extractor_is_reported_not_raised() {
        let svc = HarvestService::<_, NullExtractor, _>::new(
            StrategyOrchestrator::default(),
            MockCleaner::passthrough(),
            MemoryStore::new(),
        );
        let request = ScrapeRequest::new(URL).unwrap().with_extract("summarize");

        let outcome = svc
            .harvest(&clients(MockScrapeClient::succeeding("body")), &request)
            .await
            .unwrap();

        assert_eq!(
            outcome.extraction.unwrap().error(),
            Some("No extraction capability available")
        );
    }

    #[tokio::test]
    async fn cleaner_failure_keeps_raw() {
        let svc = HarvestService::<_, NullExtractor, _>::new(
            StrategyOrchestrator::default(),
            MockCleaner::with_error(AppError::Generic("bad html".into())),
            MemoryStore::new(),
        );

        let outcome = svc
            .harvest(
                &clients(MockScrapeClient::succeeding("<broken")),
                &ScrapeRequest::new(URL).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.representation, Some(ResourceKind::Raw));
        assert_eq!(outcome.written.len(), 1);
    }

    #[tokio::test]
    async fn fallback_success_is_learned_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let hints = StrategyConfigStore::at(dir.path().join("hints.csv"));
        let svc = HarvestService::<_, NullExtractor, _>::new(
            StrategyOrchestrator::default(),
            MockCleaner::passthrough(),
            MemoryStore::new(),
        )
        .with_strategy_store(hints.clone());

        let native = MockScrapeClient::with_responses(vec![
            Ok(ClientResponse::status(403)),
            Ok(ClientResponse::status(403)),
        ]);
        let firecrawl = MockScrapeClient::with_responses(vec![
            Ok(ClientResponse::ok(ScrapedPage::new("# first"))),
            Ok(ClientResponse::ok(ScrapedPage::new("# second"))),
        ]);
        let clients = ScrapeClients::new()
            .with(Strategy::Native, native.clone())
            .with(Strategy::Firecrawl, firecrawl.clone());

        svc.harvest(&clients, &ScrapeRequest::new(URL).unwrap())
            .await
            .unwrap();

        let rows = hints.load_config().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prefix, "example.com/docs/");
        assert_eq!(rows[0].default_strategy, Strategy::Firecrawl);
        assert!(rows[0].notes.contains("native"));

        let sibling = ScrapeRequest::new("https://example.com/docs/other").unwrap();
        let outcome = svc.harvest(&clients, &sibling).await.unwrap();

        assert_eq!(outcome.content.as_deref(), Some("# second"));
        assert_eq!(native.calls(), 1);
        assert_eq!(firecrawl.calls(), 2);
    }
}
