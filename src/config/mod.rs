//! Cache configuration: storage root and TTL policy.
//!
//! Loaded from `~/.stravacache/config.json` when present, then overridden by
//! `STRAVACACHE_*` environment variables. Every field has a default, so a
//! partial (or missing) file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TtlPolicy;
use crate::error::{CacheError, Result};

/// Override for the storage root.
pub const ENV_CACHE_DIR: &str = "STRAVACACHE_CACHE_DIR";
/// Override for the fallback TTL: seconds, or `never`.
pub const ENV_DEFAULT_TTL: &str = "STRAVACACHE_DEFAULT_TTL_SECS";
/// Policy preset: `bounded` or `unbounded`.
pub const ENV_POLICY: &str = "STRAVACACHE_POLICY";

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one JSON file per cached record.
    pub cache_dir: PathBuf,
    /// Per-category expiration policy.
    pub policy: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: Self::dir().join("cache"),
            policy: TtlPolicy::bounded(),
        }
    }
}

impl CacheConfig {
    /// Base directory: `~/.stravacache`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stravacache")
    }

    /// Default config file: `~/.stravacache/config.json`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load the default config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields defaults; malformed JSON is
    /// an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(CacheError::io(path, e)),
        };

        serde_json::from_str(&raw).map_err(|e| {
            CacheError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `STRAVACACHE_*` overrides using `lookup` to read variables.
    ///
    /// The policy preset is applied before the default TTL, so
    /// `STRAVACACHE_POLICY=unbounded` with `STRAVACACHE_DEFAULT_TTL_SECS=60`
    /// expires only unlisted categories.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            self.cache_dir = PathBuf::from(dir.trim());
        }

        if let Some(preset) = lookup(ENV_POLICY) {
            self.policy = match preset.trim().to_lowercase().as_str() {
                "bounded" => TtlPolicy::bounded(),
                "unbounded" => TtlPolicy::unbounded(),
                other => {
                    return Err(CacheError::Config(format!(
                        "{ENV_POLICY} must be 'bounded' or 'unbounded', got '{other}'"
                    )))
                }
            };
        }

        if let Some(ttl) = lookup(ENV_DEFAULT_TTL) {
            self.policy.default_ttl_secs = parse_ttl(&ttl)?;
        }

        Ok(())
    }
}

/// Parse a TTL setting: whole seconds, or `never` / `none` for no expiry.
pub fn parse_ttl(raw: &str) -> Result<Option<u64>> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("never") || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed.parse::<u64>().map(Some).map_err(|_| {
        CacheError::Config(format!(
            "Invalid TTL '{trimmed}': expected seconds or 'never'"
        ))
    })
}
