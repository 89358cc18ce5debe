//! Per-call record of what the fallback chain did.
//!
//! A [`Diagnostics`] value is owned by a single orchestration call and is
//! returned with every [`ScrapeResult`](crate::models::ScrapeResult),
//! successful or not.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Strategy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Strategies whose client was actually invoked, in invocation order.
    pub strategies_attempted: Vec<Strategy>,
    /// Failed or unavailable strategies only.
    pub strategy_errors: BTreeMap<Strategy, String>,
    /// Wall-clock milliseconds per attempted strategy.
    pub timing: BTreeMap<Strategy, u64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a strategy that was skipped because no client is configured.
    /// Unavailable strategies never appear in `strategies_attempted` or `timing`.
    pub fn mark_unavailable(&mut self, strategy: Strategy) {
        self.strategy_errors.insert(
            strategy,
            format!("{} client not configured", strategy.display_name()),
        );
    }

    pub fn record_attempt(&mut self, strategy: Strategy, elapsed_ms: u64) {
        self.strategies_attempted.push(strategy);
        self.timing.insert(strategy, elapsed_ms);
    }

    pub fn record_error(&mut self, strategy: Strategy, error: impl Into<String>) {
        self.strategy_errors.insert(strategy, error.into());
    }

    pub fn error_for(&self, strategy: Strategy) -> Option<&str> {
        self.strategy_errors.get(&strategy).map(String::as_str)
    }

    pub fn was_attempted(&self, strategy: Strategy) -> bool {
        self.strategies_attempted.contains(&strategy)
    }

    /// Combined message for an exhausted chain.
    ///
    /// Attempted strategies are listed in invocation order, followed by any
    /// unavailable ones.
    pub fn exhausted_message(&self) -> String {
        let attempted = if self.strategies_attempted.is_empty() {
            "none".to_string()
        } else {
            self.strategies_attempted
                .iter()
                .map(Strategy::key)
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut ordered: Vec<Strategy> = self.strategies_attempted.clone();
        ordered.extend(
            self.strategy_errors
                .keys()
                .filter(|s| !self.strategies_attempted.contains(s)),
        );

        let details = ordered
            .iter()
            .filter_map(|s| self.strategy_errors.get(s).map(|e| format!("{s}: {e}")))
            .collect::<Vec<_>>()
            .join("; ");

        format!("All strategies failed. Attempted: {attempted}. {details}")
    }
}
