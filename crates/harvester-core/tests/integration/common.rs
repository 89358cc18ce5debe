use harvester_core::config::CacheConfig;
use harvester_core::{CacheBackend, ClientResponse, ScrapeClients, Strategy};
use harvester_core::testutil::MockScrapeClient;
use tempfile::TempDir;

/// Both cache backends, the durable one rooted in a fresh temp dir.
///
/// The `TempDir` must outlive the backends.
pub fn cache_backends() -> (Vec<(&'static str, CacheBackend)>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backends = vec![
        ("memory", CacheBackend::from_config(&CacheConfig::Memory)),
        (
            "filesystem",
            CacheBackend::from_config(&CacheConfig::Filesystem {
                root: dir.path().join("cache"),
            }),
        ),
    ];
    (backends, dir)
}

/// Three configured backends that all fail, each in its own way.
pub fn failing_trio() -> (ScrapeClients, [MockScrapeClient; 3]) {
    let native = MockScrapeClient::with_responses(vec![Ok(ClientResponse::status(403))]);
    let firecrawl = MockScrapeClient::with_error_text("Rate limited");
    let brightdata = MockScrapeClient::with_error_text("Proxy error");
    let clients = ScrapeClients::new()
        .with(Strategy::Native, native.clone())
        .with(Strategy::Firecrawl, firecrawl.clone())
        .with(Strategy::BrightData, brightdata.clone());
    (clients, [native, firecrawl, brightdata])
}
