use std::time::Duration;

use harvester_core::testutil::MockScrapeClient;
use harvester_core::{
    AuthPhrases, ClientResponse, OrchestratorConfig, ScrapeClients, ScrapeRequest, ScrapedPage,
    Strategy, StrategyOrchestrator,
};

use crate::integration::common::failing_trio;

fn request() -> ScrapeRequest {
    ScrapeRequest::new("https://example.com/article").unwrap()
}

#[tokio::test]
async fn every_strategy_failing_reports_each_error() {
    let (clients, mocks) = failing_trio();

    let result = StrategyOrchestrator::default()
        .scrape_universal(&clients, &request())
        .await;

    assert!(!result.success);
    assert!(!result.is_auth_error);
    let diag = &result.diagnostics;
    assert_eq!(
        diag.strategies_attempted,
        vec![Strategy::Native, Strategy::Firecrawl, Strategy::BrightData]
    );
    assert_eq!(diag.error_for(Strategy::Native), Some("HTTP 403"));
    assert_eq!(diag.error_for(Strategy::Firecrawl), Some("Rate limited"));
    assert_eq!(diag.error_for(Strategy::BrightData), Some("Proxy error"));
    assert_eq!(diag.timing.len(), 3);
    assert_eq!(
        result.error.as_deref(),
        Some(
            "All strategies failed. Attempted: native, firecrawl, brightdata. \
             native: HTTP 403; firecrawl: Rate limited; brightdata: Proxy error"
        )
    );
    for mock in &mocks {
        assert_eq!(mock.calls(), 1);
    }
}

#[tokio::test]
async fn absent_client_is_reported_but_never_called() {
    let native = MockScrapeClient::with_status(500);
    let brightdata = MockScrapeClient::with_error_text("Proxy error");
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native.clone())
        .with(Strategy::BrightData, brightdata.clone());

    let result = StrategyOrchestrator::default()
        .scrape_universal(&clients, &request())
        .await;

    let diag = &result.diagnostics;
    assert!(!result.success);
    assert!(!diag.was_attempted(Strategy::Firecrawl));
    assert!(!diag.timing.contains_key(&Strategy::Firecrawl));
    assert_eq!(
        diag.error_for(Strategy::Firecrawl),
        Some("Firecrawl client not configured")
    );
    assert_eq!(
        diag.strategies_attempted,
        vec![Strategy::Native, Strategy::BrightData]
    );
    assert_eq!(native.calls(), 1);
    assert_eq!(brightdata.calls(), 1);
}

#[tokio::test]
async fn rejected_credentials_stop_the_chain() {
    let native = MockScrapeClient::with_status(403);
    let firecrawl = MockScrapeClient::with_error_text("Unauthorized: Invalid API key");
    let brightdata = MockScrapeClient::succeeding("<html>never</html>");
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native.clone())
        .with(Strategy::Firecrawl, firecrawl.clone())
        .with(Strategy::BrightData, brightdata.clone());

    let result = StrategyOrchestrator::default()
        .scrape_universal(&clients, &request())
        .await;

    assert!(!result.success);
    assert!(result.is_auth_error);
    assert_eq!(result.source, Some(Strategy::Firecrawl));
    let error = result.error.unwrap();
    assert!(error.contains("Firecrawl authentication failed"));
    assert!(error.contains("Invalid API key"));
    assert_eq!(brightdata.calls(), 0);
    assert_eq!(
        result.diagnostics.strategies_attempted,
        vec![Strategy::Native, Strategy::Firecrawl]
    );
}

#[tokio::test]
async fn custom_auth_phrase_is_honoured() {
    let firecrawl = MockScrapeClient::with_error_text("Payment Required: credits exhausted");
    let brightdata = MockScrapeClient::succeeding("ok");
    let clients = ScrapeClients::new()
        .with(Strategy::Firecrawl, firecrawl)
        .with(Strategy::BrightData, brightdata.clone());

    let phrases = AuthPhrases::default().with_phrase(Strategy::Firecrawl, "Payment Required");
    let orchestrator = StrategyOrchestrator::default().with_auth_phrases(phrases);
    let result = orchestrator.scrape_universal(&clients, &request()).await;

    assert!(result.is_auth_error);
    assert_eq!(brightdata.calls(), 0);
}

#[tokio::test]
async fn speed_mode_from_config_skips_native() {
    let config = OrchestratorConfig::from_lookup(|key| {
        (key == "OPTIMIZE_FOR").then(|| "speed".to_string())
    })
    .unwrap();
    let native = MockScrapeClient::succeeding("native");
    let firecrawl = MockScrapeClient::succeeding("firecrawl");
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native.clone())
        .with(Strategy::Firecrawl, firecrawl);

    let result = StrategyOrchestrator::new(config)
        .scrape_universal(&clients, &request())
        .await;

    assert!(result.success);
    assert_eq!(result.source, Some(Strategy::Firecrawl));
    assert_eq!(native.calls(), 0);
    assert!(result.diagnostics.strategy_errors.is_empty());
}

#[tokio::test]
async fn slow_strategy_times_out_and_falls_back() {
    let native = MockScrapeClient::succeeding("late").with_delay(Duration::from_millis(500));
    let firecrawl = MockScrapeClient::with_responses(vec![Ok(ClientResponse::ok(
        ScrapedPage::new("# fast").with_content_type("text/markdown"),
    ))]);
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native)
        .with(Strategy::Firecrawl, firecrawl);

    let request = request().with_timeout(Duration::from_millis(50));
    let result = StrategyOrchestrator::default()
        .scrape_universal(&clients, &request)
        .await;

    assert!(result.success);
    assert_eq!(result.source, Some(Strategy::Firecrawl));
    assert_eq!(
        result.diagnostics.error_for(Strategy::Native),
        Some("Timed out after 50ms")
    );
    assert_eq!(
        result.data.unwrap().content_type.as_deref(),
        Some("text/markdown")
    );
}
