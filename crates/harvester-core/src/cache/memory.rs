use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    Resource, ResourceStore, ResourceWrite, WriteClock, WrittenResource, matches_extract,
    sort_newest_first,
};
use crate::error::AppError;

/// Process-lifetime cache backend.
///
/// Writes only append; a resource is removed only by an explicit `delete`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    resources: Arc<RwLock<Vec<Resource>>>,
    clock: WriteClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock helpers that recover from poison; entries are immutable so a
    /// panicked writer cannot leave one half-updated.
    fn read_guard(&self) -> RwLockReadGuard<'_, Vec<Resource>> {
        self.resources.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned cache lock");
            poisoned.into_inner()
        })
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Vec<Resource>> {
        self.resources.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned cache lock");
            poisoned.into_inner()
        })
    }
}

impl ResourceStore for MemoryStore {
    async fn write_multi(&self, write: ResourceWrite) -> Result<Vec<WrittenResource>, AppError> {
        let url = write.url.clone();
        let resources = write.into_resources(&self.clock)?;
        let written: Vec<WrittenResource> = resources.iter().map(WrittenResource::from).collect();

        self.write_guard().extend(resources);
        tracing::debug!(%url, count = written.len(), "Cached resources in memory");
        Ok(written)
    }

    async fn read(&self, uri: &str) -> Result<Resource, AppError> {
        self.read_guard()
            .iter()
            .find(|r| r.uri == uri)
            .cloned()
            .ok_or_else(|| AppError::not_found(uri))
    }

    async fn list(&self) -> Result<Vec<Resource>, AppError> {
        let mut all = self.read_guard().clone();
        sort_newest_first(&mut all);
        Ok(all)
    }

    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
    ) -> Result<Vec<Resource>, AppError> {
        let mut found: Vec<Resource> = self
            .read_guard()
            .iter()
            .filter(|r| matches_extract(r, url, extract_query))
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn exists(&self, uri: &str) -> Result<bool, AppError> {
        Ok(self.read_guard().iter().any(|r| r.uri == uri))
    }

    async fn delete(&self, uri: &str) -> Result<(), AppError> {
        let mut resources = self.write_guard();
        let position = resources
            .iter()
            .position(|r| r.uri == uri)
            .ok_or_else(|| AppError::not_found(uri))?;
        resources.remove(position);
        Ok(())
    }
}
