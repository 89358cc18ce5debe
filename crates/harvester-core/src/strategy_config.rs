//! Persisted URL-prefix → preferred-strategy hints.
//!
//! The table lives in one human-editable CSV file with the columns
//! `prefix,default_strategy,notes`. It is advisory: concurrent writers are
//! last-writer-wins, but every write replaces the file atomically so a
//! reader never sees a partial table.

use std::io::Write;
use std::path::{Path, PathBuf};

use url::Url;

use crate::config::StrategyStoreConfig;
use crate::error::AppError;
use crate::models::Strategy;

const HEADER: [&str; 3] = ["prefix", "default_strategy", "notes"];

/// Example rows written when the default file is created.
const SEED_ROWS: &[(&str, Strategy, &str)] = &[
    (
        "reddit.com",
        Strategy::BrightData,
        "Aggressive bot detection; direct fetches are blocked",
    ),
    (
        "linkedin.com",
        Strategy::BrightData,
        "Login wall for anonymous clients",
    ),
    (
        "medium.com",
        Strategy::Firecrawl,
        "Client-side rendering hides article bodies",
    ),
];

/// Canonical hint key for a URL.
///
/// `host[:port]` when the path has at most one segment, otherwise
/// `host[:port]/<all but the last segment>/`. Query and fragment are
/// dropped. Input that does not parse as an absolute URL is returned as is.
pub fn extract_url_pattern(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    let mut pattern = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if segments.len() > 1 {
        pattern.push('/');
        pattern.push_str(&segments[..segments.len() - 1].join("/"));
        pattern.push('/');
    }
    pattern
}

/// True when `prefix` covers `pattern` on a segment boundary.
fn prefix_matches(prefix: &str, pattern: &str) -> bool {
    if prefix.is_empty() || !pattern.starts_with(prefix) {
        return false;
    }
    prefix.ends_with('/')
        || pattern.len() == prefix.len()
        || pattern[prefix.len()..].starts_with('/')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfigEntry {
    pub prefix: String,
    pub default_strategy: Strategy,
    pub notes: String,
}

impl StrategyConfigEntry {
    pub fn new(prefix: impl Into<String>, strategy: Strategy, notes: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            default_strategy: strategy,
            notes: notes.into(),
        }
    }
}

/// File-backed hint table.
#[derive(Debug, Clone)]
pub struct StrategyConfigStore {
    path: PathBuf,
    /// Set only for the process-default location.
    seed_on_first_use: bool,
}

impl StrategyConfigStore {
    /// Resolve the file location: explicit path, then the configured
    /// override, then the per-install default (seeded on first use).
    pub fn new(explicit: Option<PathBuf>, config: &StrategyStoreConfig) -> Self {
        match explicit.or_else(|| config.path.clone()) {
            Some(path) => Self::at(path),
            None => Self::seeded_at(StrategyStoreConfig::default_path()),
        }
    }

    /// A default-location store: a missing file is created with example rows.
    pub(crate) fn seeded_at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed_on_first_use: true,
        }
    }

    /// Use exactly `path`. A missing file reads as an empty table.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed_on_first_use: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows in file order. Malformed rows are skipped.
    pub async fn load_config(&self) -> Result<Vec<StrategyConfigEntry>, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.seed_on_first_use {
                    return self.seed().await;
                }
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(AppError::StrategyConfigError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        Ok(parse_rows(&bytes, &self.path))
    }

    /// Insert `entry`, or replace the row with the same prefix in place.
    /// The file is written before this returns.
    pub async fn upsert_entry(&self, entry: StrategyConfigEntry) -> Result<(), AppError> {
        let mut rows = self.load_config().await?;
        match rows.iter_mut().find(|row| row.prefix == entry.prefix) {
            Some(row) => *row = entry,
            None => rows.push(entry),
        }
        self.persist(&rows).await
    }

    /// The longest stored prefix covering `url`'s pattern.
    pub async fn find_for_url(&self, url: &str) -> Result<Option<StrategyConfigEntry>, AppError> {
        let pattern = extract_url_pattern(url);
        let rows = self.load_config().await?;
        Ok(rows
            .into_iter()
            .filter(|row| prefix_matches(&row.prefix, &pattern))
            .max_by_key(|row| row.prefix.len()))
    }

    async fn seed(&self) -> Result<Vec<StrategyConfigEntry>, AppError> {
        let rows: Vec<StrategyConfigEntry> = SEED_ROWS
            .iter()
            .map(|(prefix, strategy, notes)| StrategyConfigEntry::new(*prefix, *strategy, *notes))
            .collect();
        self.persist(&rows).await?;
        tracing::info!(path = %self.path.display(), rows = rows.len(), "Seeded strategy config");
        Ok(rows)
    }

    async fn persist(&self, rows: &[StrategyConfigEntry]) -> Result<(), AppError> {
        let bytes = render_rows(rows)?;
        let path = self.path.clone();
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };

        // Each writer gets its own temp file; the rename publishes it whole.
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::Builder::new()
                .prefix(".strategy-config-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::StrategyConfigError(format!("Write task failed: {e}")))?;

        written.map_err(|e| {
            AppError::StrategyConfigError(format!("Failed to write {}: {e}", self.path.display()))
        })
    }
}

fn parse_rows(bytes: &[u8], path: &Path) -> Vec<StrategyConfigEntry> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let columns = match reader.headers() {
        Ok(headers) => {
            let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
            (find(HEADER[0]), find(HEADER[1]), find(HEADER[2]))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable strategy config header");
            return Vec::new();
        }
    };
    let (Some(prefix_col), Some(strategy_col), notes_col) = columns else {
        tracing::warn!(
            path = %path.display(),
            "Strategy config is missing the prefix or default_strategy column"
        );
        return Vec::new();
    };

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line + 2, error = %e, "Skipping malformed strategy row");
                continue;
            }
        };
        let prefix = record.get(prefix_col).unwrap_or_default();
        let strategy = record.get(strategy_col).unwrap_or_default();
        if prefix.is_empty() {
            tracing::warn!(line = line + 2, "Skipping strategy row without prefix");
            continue;
        }
        let Ok(default_strategy) = strategy.parse::<Strategy>() else {
            tracing::warn!(
                line = line + 2,
                %strategy,
                "Skipping strategy row with unknown strategy"
            );
            continue;
        };
        let notes = notes_col
            .and_then(|col| record.get(col))
            .unwrap_or_default();
        rows.push(StrategyConfigEntry::new(prefix, default_strategy, notes));
    }
    rows
}

fn render_rows(rows: &[StrategyConfigEntry]) -> Result<Vec<u8>, AppError> {
    let csv_err = |e: csv::Error| AppError::StrategyConfigError(e.to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(csv_err)?;
    for row in rows {
        writer
            .write_record([row.prefix.as_str(), row.default_strategy.key(), row.notes.as_str()])
            .map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::StrategyConfigError(e.to_string()))
}
