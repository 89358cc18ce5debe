use harvester_core::testutil::{MockCleaner, MockExtractor, MockScrapeClient};
use harvester_core::{
    ClientResponse, FsStore, HarvestService, ResourceKind, ScrapeClients, ScrapeRequest,
    ScrapedPage, Strategy, StrategyConfigStore, StrategyOrchestrator,
};

#[tokio::test]
async fn durable_harvest_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let hints_path = dir.path().join("hints.csv");
    let url = "https://reddit.com/r/rust/comments/42/title";

    let native = MockScrapeClient::with_status(403);
    let brightdata = MockScrapeClient::with_responses(vec![Ok(ClientResponse::ok(
        ScrapedPage::new("<h1>Rust</h1>").with_content_type("text/html"),
    ))]);
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native.clone())
        .with(Strategy::BrightData, brightdata.clone());

    let service = HarvestService::new(
        StrategyOrchestrator::default(),
        MockCleaner::passthrough(),
        FsStore::new(&cache_root),
    )
    .with_extractor(MockExtractor::new("Rust"))
    .with_strategy_store(StrategyConfigStore::at(&hints_path));

    let request = ScrapeRequest::new(url).unwrap().with_extract("get the title");
    let first = service.harvest(&clients, &request).await.unwrap();

    assert_eq!(first.content.as_deref(), Some("Rust"));
    assert_eq!(first.written.len(), 3);
    let scrape = first.scrape.unwrap();
    assert_eq!(scrape.source, Some(Strategy::BrightData));
    assert_eq!(scrape.diagnostics.error_for(Strategy::Native), Some("HTTP 403"));
    assert_eq!(
        scrape.diagnostics.error_for(Strategy::Firecrawl),
        Some("Firecrawl client not configured")
    );

    let hints = StrategyConfigStore::at(&hints_path);
    let learned = hints.find_for_url(url).await.unwrap().unwrap();
    assert_eq!(learned.prefix, "reddit.com/r/rust/comments/42/");
    assert_eq!(learned.default_strategy, Strategy::BrightData);

    // A fresh process sees the same cache and hints.
    let untouched = MockScrapeClient::with_status(500);
    let restarted = HarvestService::new(
        StrategyOrchestrator::default(),
        MockCleaner::passthrough(),
        FsStore::new(&cache_root),
    )
    .with_extractor(MockExtractor::new("unused"))
    .with_strategy_store(hints);
    let clients = ScrapeClients::new().with(Strategy::Native, untouched.clone());

    let second = restarted.harvest(&clients, &request).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.content.as_deref(), Some("Rust"));
    assert_eq!(second.representation, Some(ResourceKind::Extracted));
    assert_eq!(untouched.calls(), 0);
}

#[tokio::test]
async fn hint_reorders_the_chain_for_matching_urls() {
    let dir = tempfile::tempdir().unwrap();
    let hints = StrategyConfigStore::at(dir.path().join("hints.csv"));
    hints
        .upsert_entry(harvester_core::StrategyConfigEntry::new(
            "medium.com",
            Strategy::Firecrawl,
            "client-side rendering",
        ))
        .await
        .unwrap();

    let native = MockScrapeClient::succeeding("<html>shell</html>");
    let firecrawl = MockScrapeClient::succeeding("# Article");
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native.clone())
        .with(Strategy::Firecrawl, firecrawl.clone());

    let service = HarvestService::<_, harvester_core::NullExtractor, _>::new(
        StrategyOrchestrator::default(),
        MockCleaner::passthrough(),
        harvester_core::MemoryStore::new(),
    )
    .with_strategy_store(hints.clone());

    let outcome = service
        .harvest(&clients, &ScrapeRequest::new("https://medium.com/@a/post").unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.content.as_deref(), Some("# Article"));
    assert_eq!(native.calls(), 0);
    assert_eq!(firecrawl.calls(), 1);
    assert_eq!(hints.load_config().await.unwrap().len(), 1);
}
