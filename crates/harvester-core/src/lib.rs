pub mod auth;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod strategy_config;
pub mod testutil;
pub mod traits;

pub use auth::AuthPhrases;
pub use cache::{
    CacheBackend, FsStore, MemoryStore, Resource, ResourceKind, ResourceMetadata, ResourceStore,
    ResourceWrite, WrittenResource,
};
pub use config::{
    CacheConfig, LlmConfig, LlmProvider, OptimizeFor, OrchestratorConfig, StrategyStoreConfig,
};
pub use diagnostics::Diagnostics;
pub use error::AppError;
pub use models::{
    ClientResponse, ExtractionOutcome, ScrapeRequest, ScrapeResult, ScrapedPage, Strategy,
    compute_hash,
};
pub use orchestrator::{ScrapeClients, StrategyOrchestrator};
pub use pipeline::{HarvestOutcome, HarvestService};
pub use strategy_config::{StrategyConfigEntry, StrategyConfigStore, extract_url_pattern};
pub use traits::{Cleaner, Extractor, NullExtractor, ScrapeClient};
