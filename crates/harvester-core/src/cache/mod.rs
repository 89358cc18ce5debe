//! Immutable, multi-representation content cache.
//!
//! Every processing stage of a fetched page (raw, cleaned, extracted) is
//! stored as its own resource. Resources are never modified after they are
//! written; an "update" is a newer resource for the same URL. Ordering and
//! "most recent" queries rely on [`WriteClock`], which hands out strictly
//! increasing nanosecond write times.

pub mod filesystem;
pub mod memory;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::error::AppError;
use crate::models::compute_hash;

pub use filesystem::FsStore;
pub use memory::MemoryStore;

const URI_SCHEME: &str = "cache://";
const URL_KEY_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Raw,
    Cleaned,
    Extracted,
}

impl ResourceKind {
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::Raw => "raw",
            ResourceKind::Cleaned => "cleaned",
            ResourceKind::Extracted => "extracted",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ResourceKind::Raw),
            "cleaned" => Ok(ResourceKind::Cleaned),
            "extracted" => Ok(ResourceKind::Extracted),
            other => Err(AppError::CacheError(format!("Unknown resource kind '{other}'"))),
        }
    }
}

/// Metadata stored alongside each resource (the durable backend's sidecar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub resource_type: ResourceKind,
    /// Query that produced an `extracted` resource, shared by every
    /// representation written in the same call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub content: String,
    pub metadata: ResourceMetadata,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        self.metadata.resource_type
    }
}

/// Input to [`ResourceStore::write_multi`]: any subset of the three
/// representations plus shared metadata.
#[derive(Debug, Clone, Default)]
pub struct ResourceWrite {
    pub url: String,
    pub raw: Option<String>,
    pub cleaned: Option<String>,
    pub extracted: Option<String>,
    pub extraction_prompt: Option<String>,
    pub content_type: Option<String>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResourceWrite {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn raw(mut self, content: impl Into<String>) -> Self {
        self.raw = Some(content.into());
        self
    }

    pub fn cleaned(mut self, content: impl Into<String>) -> Self {
        self.cleaned = Some(content.into());
        self
    }

    pub fn extracted(mut self, content: impl Into<String>) -> Self {
        self.extracted = Some(content.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Present representations in write order.
    fn representations(&self) -> impl Iterator<Item = (ResourceKind, &str)> {
        [
            (ResourceKind::Raw, self.raw.as_deref()),
            (ResourceKind::Cleaned, self.cleaned.as_deref()),
            (ResourceKind::Extracted, self.extracted.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, content)| content.map(|c| (kind, c)))
    }

    /// Build one resource per present representation, each stamped by `clock`.
    pub(crate) fn into_resources(self, clock: &WriteClock) -> Result<Vec<Resource>, AppError> {
        if self.url.trim().is_empty() {
            return Err(AppError::InvalidRequest("cache writes need a url".into()));
        }
        let url_key = url_key(&self.url);

        let resources = self
            .representations()
            .map(|(kind, content)| {
                let timestamp = clock.next();
                Resource {
                    uri: resource_uri(&url_key, &timestamp, kind),
                    content: content.to_string(),
                    metadata: ResourceMetadata {
                        url: self.url.clone(),
                        timestamp,
                        resource_type: kind,
                        extraction_prompt: self.extraction_prompt.clone(),
                        content_type: self.content_type.clone(),
                        extra: self.extra.clone(),
                    },
                }
            })
            .collect();
        Ok(resources)
    }
}

/// Identifier of one written representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenResource {
    pub kind: ResourceKind,
    pub uri: String,
}

impl From<&Resource> for WrittenResource {
    fn from(resource: &Resource) -> Self {
        Self {
            kind: resource.kind(),
            uri: resource.uri.clone(),
        }
    }
}

/// Storage contract shared by every cache backend.
///
/// Backends must agree on ordering (newest first by write time) and on
/// extraction-prompt matching, and must never mutate a stored resource.
pub trait ResourceStore: Send + Sync + Clone {
    /// Store each present representation as a separate resource.
    fn write_multi(
        &self,
        write: ResourceWrite,
    ) -> impl Future<Output = Result<Vec<WrittenResource>, AppError>> + Send;

    /// Fails with [`AppError::ResourceNotFound`] for an unknown URI.
    fn read(&self, uri: &str) -> impl Future<Output = Result<Resource, AppError>> + Send;

    /// All resources, newest first.
    fn list(&self) -> impl Future<Output = Result<Vec<Resource>, AppError>> + Send;

    /// Resources for `url`, newest first. With a query, only those whose
    /// extraction prompt equals it; without, only those with no prompt.
    fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Resource>, AppError>> + Send;

    fn exists(&self, uri: &str) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Fails with [`AppError::ResourceNotFound`] for an unknown URI.
    fn delete(&self, uri: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Hands out strictly increasing write times, finer than any realistic
/// write rate. Clones share the same sequence.
#[derive(Debug, Clone, Default)]
pub struct WriteClock {
    last_nanos: Arc<AtomicI64>,
}

impl WriteClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);
        let prev = self
            .last_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        DateTime::from_timestamp_nanos(now.max(prev + 1))
    }
}

/// Short stable directory/URI key for a URL.
pub fn url_key(url: &str) -> String {
    compute_hash(url)[..URL_KEY_LEN].to_string()
}

fn resource_uri(url_key: &str, timestamp: &DateTime<Utc>, kind: ResourceKind) -> String {
    let nanos = timestamp.timestamp_nanos_opt().unwrap_or_default();
    format!("{URI_SCHEME}{url_key}/{nanos:020}-{kind}")
}

/// Components of a well-formed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedUri<'a> {
    pub url_key: &'a str,
    /// `<nanos>-<kind>`, the file stem used by the durable backend.
    pub stem: &'a str,
    pub kind: ResourceKind,
}

pub(crate) fn parse_uri(uri: &str) -> Option<ParsedUri<'_>> {
    let rest = uri.strip_prefix(URI_SCHEME)?;
    let (url_key, stem) = rest.split_once('/')?;
    if url_key.len() != URL_KEY_LEN || !url_key.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let (nanos, kind) = stem.split_once('-')?;
    if nanos.is_empty() || !nanos.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(ParsedUri {
        url_key,
        stem,
        kind: kind.parse().ok()?,
    })
}

/// Prompt filter shared by all backends.
pub(crate) fn matches_extract(resource: &Resource, url: &str, extract_query: Option<&str>) -> bool {
    resource.metadata.url == url
        && resource.metadata.extraction_prompt.as_deref() == extract_query
}

/// Newest first; URI breaks ties so the order is total.
pub(crate) fn sort_newest_first(resources: &mut [Resource]) {
    resources.sort_by(|a, b| {
        b.metadata
            .timestamp
            .cmp(&a.metadata.timestamp)
            .then_with(|| b.uri.cmp(&a.uri))
    });
}

/// Backend chosen from [`CacheConfig`].
#[derive(Clone)]
pub enum CacheBackend {
    Memory(MemoryStore),
    Filesystem(FsStore),
}

impl CacheBackend {
    pub fn from_config(config: &CacheConfig) -> Self {
        match config {
            CacheConfig::Memory => CacheBackend::Memory(MemoryStore::new()),
            CacheConfig::Filesystem { root } => CacheBackend::Filesystem(FsStore::new(root)),
        }
    }
}

impl ResourceStore for CacheBackend {
    async fn write_multi(&self, write: ResourceWrite) -> Result<Vec<WrittenResource>, AppError> {
        match self {
            CacheBackend::Memory(store) => store.write_multi(write).await,
            CacheBackend::Filesystem(store) => store.write_multi(write).await,
        }
    }

    async fn read(&self, uri: &str) -> Result<Resource, AppError> {
        match self {
            CacheBackend::Memory(store) => store.read(uri).await,
            CacheBackend::Filesystem(store) => store.read(uri).await,
        }
    }

    async fn list(&self) -> Result<Vec<Resource>, AppError> {
        match self {
            CacheBackend::Memory(store) => store.list().await,
            CacheBackend::Filesystem(store) => store.list().await,
        }
    }

    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
    ) -> Result<Vec<Resource>, AppError> {
        match self {
            CacheBackend::Memory(store) => store.find_by_url_and_extract(url, extract_query).await,
            CacheBackend::Filesystem(store) => {
                store.find_by_url_and_extract(url, extract_query).await
            }
        }
    }

    async fn exists(&self, uri: &str) -> Result<bool, AppError> {
        match self {
            CacheBackend::Memory(store) => store.exists(uri).await,
            CacheBackend::Filesystem(store) => store.exists(uri).await,
        }
    }

    async fn delete(&self, uri: &str) -> Result<(), AppError> {
        match self {
            CacheBackend::Memory(store) => store.delete(uri).await,
            CacheBackend::Filesystem(store) => store.delete(uri).await,
        }
    }
}
