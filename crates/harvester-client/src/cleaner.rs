use std::sync::Arc;

use harvester_core::error::AppError;
use harvester_core::traits::Cleaner;
use htmd::HtmlToMarkdown;

/// Tags whose content never belongs in the `cleaned` representation.
const SKIPPED_TAGS: [&str; 10] = [
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg", "form",
];

/// HTML-to-Markdown cleaner built on htmd.
///
/// Produces the `cleaned` representation stored next to the raw page.
/// Input that is already plain text or Markdown (as returned by the
/// Firecrawl backend) passes through htmd unchanged apart from whitespace.
#[derive(Clone)]
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl HtmdCleaner {
    pub fn new() -> Self {
        Self::skipping(&SKIPPED_TAGS)
    }

    /// A cleaner that drops exactly `tags` (and their content).
    pub fn skipping(tags: &[&str]) -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(tags.to_vec())
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let markdown = self
            .converter
            .convert(html)
            .map_err(|e| AppError::CleanerError(e.to_string()))?;
        Ok(markdown.trim().to_string())
    }
}
