//! Credential-rejection detection for paid scraping backends.
//!
//! Detection is phrase matching on the backend's error text. Vendors word
//! their errors differently and change them over time, so the table is
//! data: callers extend it with [`AuthPhrases::with_phrase`]. An unmatched
//! credential error degrades to an ordinary strategy failure.

use std::collections::BTreeMap;

use crate::models::Strategy;

const FIRECRAWL_PHRASES: &[&str] = &[
    "unauthorized",
    "invalid api key",
    "invalid token",
    "api key is missing",
    "http 401",
];

const BRIGHTDATA_PHRASES: &[&str] = &[
    "unauthorized",
    "authentication failed",
    "invalid api token",
    "invalid token",
    "http 401",
];

/// Per-strategy table of lowercase authentication-failure phrases.
#[derive(Debug, Clone)]
pub struct AuthPhrases {
    phrases: BTreeMap<Strategy, Vec<String>>,
}

impl AuthPhrases {
    /// A table that never matches.
    pub fn empty() -> Self {
        Self {
            phrases: BTreeMap::new(),
        }
    }

    /// Add a phrase for `strategy`. Matching is case-insensitive.
    pub fn with_phrase(mut self, strategy: Strategy, phrase: impl Into<String>) -> Self {
        let phrase = phrase.into().to_lowercase();
        let entry = self.phrases.entry(strategy).or_default();
        if !phrase.is_empty() && !entry.contains(&phrase) {
            entry.push(phrase);
        }
        self
    }

    pub fn phrases_for(&self, strategy: Strategy) -> &[String] {
        self.phrases.get(&strategy).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the first phrase for `strategy` contained in `text`.
    pub fn detect(&self, strategy: Strategy, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.phrases_for(strategy)
            .iter()
            .find(|p| haystack.contains(p.as_str()))
            .map(String::as_str)
    }
}

impl Default for AuthPhrases {
    /// Firecrawl and BrightData phrases. Native has none: a target site
    /// answering 401 is not a problem with our credentials.
    fn default() -> Self {
        let mut table = Self::empty();
        for phrase in FIRECRAWL_PHRASES {
            table = table.with_phrase(Strategy::Firecrawl, *phrase);
        }
        for phrase in BRIGHTDATA_PHRASES {
            table = table.with_phrase(Strategy::BrightData, *phrase);
        }
        table
    }
}

/// User-facing message for a detected credential rejection.
pub fn auth_failure_message(strategy: Strategy, detail: &str) -> String {
    let name = strategy.display_name();
    format!("{name} authentication failed: {detail}. Check the {name} API credentials.")
}
