/// Smoke-test for the harvest pipeline against a live site.
///
/// Fetches <https://example.com> with the native strategy, caches every
/// representation, and, when `LLM_PROVIDER` and `LLM_API_KEY` are set,
/// extracts the page title.
///
/// Run with:
///   cargo run --example harvest_smoke -p harvester-client
use harvester_client::{ExtractionService, HtmdCleaner, NativeClient};
use harvester_core::{
    CacheBackend, CacheConfig, HarvestService, OrchestratorConfig, ResourceStore, ScrapeClients,
    ScrapeRequest, Strategy, StrategyConfigStore, StrategyOrchestrator, StrategyStoreConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvester_core=debug".into()),
        )
        .init();

    let orchestrator = StrategyOrchestrator::new(OrchestratorConfig::from_env()?);
    let cache = CacheBackend::from_config(&CacheConfig::from_env()?);
    let hints = StrategyConfigStore::new(None, &StrategyStoreConfig::from_env());
    println!("Strategy hints: {}", hints.path().display());

    let clients = ScrapeClients::new().with(Strategy::Native, NativeClient::new()?);

    let mut service = HarvestService::new(orchestrator, HtmdCleaner::new(), cache)
        .with_strategy_store(hints);
    let mut request = ScrapeRequest::new("https://example.com")?;
    if let Some(extraction) = ExtractionService::from_env()? {
        service = service.with_extractor(extraction);
        request = request.with_extract("What is the page title?");
    }

    let outcome = service.harvest(&clients, &request).await?;
    let Some(content) = &outcome.content else {
        let error = outcome
            .scrape
            .and_then(|s| s.error)
            .unwrap_or_else(|| "unknown".into());
        anyhow::bail!("Harvest failed: {error}");
    };

    assert!(
        content.contains("Example Domain"),
        "Expected page title not found in harvested content"
    );

    println!(
        "OK: {} via {:?} (from cache: {})",
        outcome
            .representation
            .map(|k| k.to_string())
            .unwrap_or_default(),
        outcome.scrape.as_ref().and_then(|s| s.source),
        outcome.from_cache
    );
    for written in &outcome.written {
        println!("  wrote {} {}", written.kind, written.uri);
    }
    println!("Cache now holds {} resources", service.cache().list().await?.len());
    println!("First 300 chars:\n{}", content.chars().take(300).collect::<String>());
    Ok(())
}
