//! Explicit configuration structs.
//!
//! Components receive these at construction time. Each struct can be read
//! from the process environment with `from_env`, or from any key lookup with
//! `from_lookup` (used by tests so they never touch real environment state).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

pub const OPTIMIZE_FOR_VAR: &str = "OPTIMIZE_FOR";
pub const STRATEGY_CONFIG_PATH_VAR: &str = "STRATEGY_CONFIG_PATH";
pub const CACHE_BACKEND_VAR: &str = "CACHE_BACKEND";
pub const CACHE_DIR_VAR: &str = "CACHE_DIR";
pub const LLM_PROVIDER_VAR: &str = "LLM_PROVIDER";
pub const LLM_API_KEY_VAR: &str = "LLM_API_KEY";
pub const LLM_MODEL_VAR: &str = "LLM_MODEL";
pub const LLM_API_BASE_URL_VAR: &str = "LLM_API_BASE_URL";

/// Per-install scratch directory holding default file locations.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("harvester")
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Reads `key`, treating blank values as unset.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Global optimization mode for candidate ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptimizeFor {
    /// Try the free native fetch first, then paid backends.
    #[default]
    Cost,
    /// Skip native and start from the fastest paid backend.
    Speed,
}

impl FromStr for OptimizeFor {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cost" => Ok(OptimizeFor::Cost),
            "speed" => Ok(OptimizeFor::Speed),
            other => Err(AppError::ConfigError(format!(
                "Invalid {OPTIMIZE_FOR_VAR} '{other}': expected 'cost' or 'speed'"
            ))),
        }
    }
}

impl fmt::Display for OptimizeFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeFor::Cost => write!(f, "cost"),
            OptimizeFor::Speed => write!(f, "speed"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub optimize_for: OptimizeFor,
}

impl OrchestratorConfig {
    /// - `OPTIMIZE_FOR` (optional, `cost` or `speed`, defaults to `cost`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let optimize_for = match non_empty(&lookup, OPTIMIZE_FOR_VAR) {
            Some(raw) => raw.parse()?,
            None => OptimizeFor::default(),
        };
        Ok(Self { optimize_for })
    }
}

// ---------------------------------------------------------------------------
// Strategy hint store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StrategyStoreConfig {
    /// Environment override for the hint file location.
    pub path: Option<PathBuf>,
}

impl StrategyStoreConfig {
    /// - `STRATEGY_CONFIG_PATH` (optional)
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            path: non_empty(&lookup, STRATEGY_CONFIG_PATH_VAR).map(PathBuf::from),
        }
    }

    pub fn default_path() -> PathBuf {
        scratch_dir().join("strategy-config.csv")
    }
}

// ---------------------------------------------------------------------------
// Resource cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheConfig {
    #[default]
    Memory,
    Filesystem { root: PathBuf },
}

impl CacheConfig {
    /// - `CACHE_BACKEND` (optional, `memory` or `filesystem`, defaults to `memory`)
    /// - `CACHE_DIR` (optional root for `filesystem`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let backend = non_empty(&lookup, CACHE_BACKEND_VAR).map(|b| b.to_ascii_lowercase());
        match backend.as_deref() {
            None | Some("memory") => Ok(CacheConfig::Memory),
            Some("filesystem") | Some("fs") => {
                let root = non_empty(&lookup, CACHE_DIR_VAR)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| scratch_dir().join("cache"));
                Ok(CacheConfig::Filesystem { root })
            }
            Some(other) => Err(AppError::ConfigError(format!(
                "Invalid {CACHE_BACKEND_VAR} '{other}': expected 'memory' or 'filesystem'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// LLM extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    /// Any self-hosted or third-party OpenAI-compatible endpoint.
    Compatible,
}

impl FromStr for LlmProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAi),
            "compatible" | "openai-compatible" | "openai_compatible" => {
                Ok(LlmProvider::Compatible)
            }
            other => Err(AppError::ConfigError(format!(
                "Unknown {LLM_PROVIDER_VAR} '{other}': expected anthropic, openai or compatible"
            ))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Anthropic => write!(f, "anthropic"),
            LlmProvider::OpenAi => write!(f, "openai"),
            LlmProvider::Compatible => write!(f, "compatible"),
        }
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(provider: LlmProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            api_base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Read extraction settings from the environment.
    ///
    /// - `LLM_PROVIDER` and `LLM_API_KEY` (both required for extraction)
    /// - `LLM_MODEL`, `LLM_API_BASE_URL` (optional)
    ///
    /// Returns `Ok(None)` when either required variable is missing: extraction
    /// is an optional capability. An unrecognized provider name is an error.
    pub fn from_env() -> Result<Option<Self>, AppError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, AppError> {
        let (Some(provider), Some(api_key)) = (
            non_empty(&lookup, LLM_PROVIDER_VAR),
            non_empty(&lookup, LLM_API_KEY_VAR),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            provider: provider.parse()?,
            api_key,
            model: non_empty(&lookup, LLM_MODEL_VAR),
            api_base_url: non_empty(&lookup, LLM_API_BASE_URL_VAR),
        }))
    }
}
