//! Per-category time-to-live table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fallback TTL for categories without an explicit entry (1 hour).
pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Expiration policy keyed by category.
///
/// A TTL of `None` means "never expires": the record stays valid until it is
/// deleted or the cache is cleared. In JSON that is written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    /// TTL applied to categories missing from `categories`.
    pub default_ttl_secs: Option<u64>,
    /// Explicit per-category TTLs.
    pub categories: BTreeMap<String, Option<u64>>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::bounded()
    }
}

impl TtlPolicy {
    /// Finite TTLs tuned for Strava payloads.
    ///
    /// Segment metadata rarely changes, activity detail and streams never
    /// change once recorded, and effort lists grow as new efforts are
    /// uploaded.
    pub fn bounded() -> Self {
        let categories = [
            ("segment", DAY),
            ("activity", 7 * DAY),
            ("streams", 7 * DAY),
            ("efforts", HOUR),
        ]
        .into_iter()
        .map(|(name, ttl)| (name.to_string(), Some(ttl)))
        .collect();

        Self {
            default_ttl_secs: Some(DEFAULT_TTL_SECS),
            categories,
        }
    }

    /// Nothing expires; stale data is dropped only by an explicit clear.
    pub fn unbounded() -> Self {
        Self {
            default_ttl_secs: None,
            categories: BTreeMap::new(),
        }
    }

    /// TTL for `category`: an explicit entry wins, otherwise the default.
    pub fn ttl_for(&self, category: &str) -> Option<u64> {
        match self.categories.get(category) {
            Some(ttl) => *ttl,
            None => self.default_ttl_secs,
        }
    }

    /// Builder-style override for a single category.
    pub fn with_category(mut self, category: impl Into<String>, ttl_secs: Option<u64>) -> Self {
        self.categories.insert(category.into(), ttl_secs);
        self
    }

    pub fn with_default(mut self, ttl_secs: Option<u64>) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// `true` when no category can ever expire.
    pub fn is_unbounded(&self) -> bool {
        self.default_ttl_secs.is_none() && self.categories.values().all(Option::is_none)
    }
}
