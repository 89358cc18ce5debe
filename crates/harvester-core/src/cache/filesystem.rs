use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{
    ParsedUri, Resource, ResourceMetadata, ResourceStore, ResourceWrite, WriteClock,
    WrittenResource, matches_extract, parse_uri, sort_newest_first, url_key,
};
use crate::error::AppError;

const CONTENT_EXT: &str = "content";
const META_SUFFIX: &str = ".meta.json";

/// Durable cache backend.
///
/// Layout: `<root>/<url-key>/<nanos>-<kind>.content` with a
/// `<nanos>-<kind>.meta.json` sidecar. Each file is written to a temporary
/// name and renamed into place; the sidecar goes last, so a resource is
/// visible only once both files are complete.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    clock: WriteClock,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: WriteClock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn paths(&self, url_key: &str, stem: &str) -> (PathBuf, PathBuf) {
        let dir = self.root.join(url_key);
        (
            dir.join(format!("{stem}.{CONTENT_EXT}")),
            dir.join(format!("{stem}{META_SUFFIX}")),
        )
    }

    fn paths_for(&self, parsed: &ParsedUri<'_>) -> (PathBuf, PathBuf) {
        self.paths(parsed.url_key, parsed.stem)
    }

    async fn store(&self, resource: &Resource) -> Result<(), AppError> {
        let parsed = parse_uri(&resource.uri)
            .ok_or_else(|| AppError::CacheError(format!("Malformed uri {}", resource.uri)))?;
        let (content_path, meta_path) = self.paths_for(&parsed);

        if let Some(dir) = content_path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(cache_io)?;
        }
        atomic_write(&content_path, resource.content.as_bytes()).await?;
        atomic_write(&meta_path, &serde_json::to_vec_pretty(&resource.metadata)?).await?;
        Ok(())
    }

    /// Load one resource from its sidecar path, or `None` if it vanished.
    async fn load(
        &self,
        uri: String,
        content_path: &Path,
        meta_path: &Path,
    ) -> Result<Option<Resource>, AppError> {
        let meta_bytes = match tokio::fs::read(meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_io(e)),
        };
        let metadata: ResourceMetadata = serde_json::from_slice(&meta_bytes)?;
        let content = match tokio::fs::read_to_string(content_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_io(e)),
        };
        Ok(Some(Resource {
            uri,
            content,
            metadata,
        }))
    }

    /// Every readable resource under one URL directory.
    async fn scan_dir(&self, url_key: &str) -> Result<Vec<Resource>, AppError> {
        let dir = self.root.join(url_key);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(cache_io(e)),
        };

        let mut resources = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(cache_io)? {
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX)) else {
                continue;
            };
            let uri = format!("cache://{url_key}/{stem}");
            let Some(parsed) = parse_uri(&uri) else {
                continue;
            };
            let (content_path, meta_path) = self.paths_for(&parsed);
            match self.load(uri.clone(), &content_path, &meta_path).await {
                Ok(Some(resource)) => resources.push(resource),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%uri, error = %e, "Skipping unreadable cache entry");
                }
            }
        }
        Ok(resources)
    }
}

impl ResourceStore for FsStore {
    async fn write_multi(&self, write: ResourceWrite) -> Result<Vec<WrittenResource>, AppError> {
        let url = write.url.clone();
        let resources = write.into_resources(&self.clock)?;

        let mut written = Vec::with_capacity(resources.len());
        for resource in &resources {
            self.store(resource).await?;
            written.push(WrittenResource::from(resource));
        }
        tracing::debug!(
            %url,
            count = written.len(),
            root = %self.root.display(),
            "Cached resources on disk"
        );
        Ok(written)
    }

    async fn read(&self, uri: &str) -> Result<Resource, AppError> {
        let parsed = parse_uri(uri).ok_or_else(|| AppError::not_found(uri))?;
        let (content_path, meta_path) = self.paths_for(&parsed);
        self.load(uri.to_string(), &content_path, &meta_path)
            .await?
            .ok_or_else(|| AppError::not_found(uri))
    }

    async fn list(&self) -> Result<Vec<Resource>, AppError> {
        let mut dirs = match tokio::fs::read_dir(&self.root).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(cache_io(e)),
        };

        let mut all = Vec::new();
        while let Some(entry) = dirs.next_entry().await.map_err(cache_io)? {
            if !entry.file_type().await.map_err(cache_io)?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(key) = name.to_str() {
                all.extend(self.scan_dir(key).await?);
            }
        }
        sort_newest_first(&mut all);
        Ok(all)
    }

    async fn find_by_url_and_extract(
        &self,
        url: &str,
        extract_query: Option<&str>,
    ) -> Result<Vec<Resource>, AppError> {
        let mut found: Vec<Resource> = self
            .scan_dir(&url_key(url))
            .await?
            .into_iter()
            .filter(|r| matches_extract(r, url, extract_query))
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn exists(&self, uri: &str) -> Result<bool, AppError> {
        let Some(parsed) = parse_uri(uri) else {
            return Ok(false);
        };
        let (_, meta_path) = self.paths_for(&parsed);
        tokio::fs::try_exists(meta_path).await.map_err(cache_io)
    }

    async fn delete(&self, uri: &str) -> Result<(), AppError> {
        let parsed = parse_uri(uri).ok_or_else(|| AppError::not_found(uri))?;
        let (content_path, meta_path) = self.paths_for(&parsed);

        match tokio::fs::remove_file(&meta_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::not_found(uri)),
            Err(e) => return Err(cache_io(e)),
        }
        match tokio::fs::remove_file(&content_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_io(e)),
        }
    }
}

fn cache_io(e: std::io::Error) -> AppError {
    AppError::CacheError(e.to_string())
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await.map_err(cache_io)?;
    tokio::fs::rename(&tmp, path).await.map_err(cache_io)
}
