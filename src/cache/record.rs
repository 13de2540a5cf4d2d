//! On-disk record envelope: `{"timestamp": <float>, "data": <json>}`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// A single persisted API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Seconds since the Unix epoch at write time.
    pub timestamp: f64,
    /// Opaque payload returned by the upstream API.
    pub data: serde_json::Value,
}

impl CacheRecord {
    /// New record stamped with the current time.
    pub fn new(data: serde_json::Value) -> Self {
        Self::stored_at(now_secs(), data)
    }

    pub fn stored_at(timestamp: f64, data: serde_json::Value) -> Self {
        Self { timestamp, data }
    }

    /// Age in seconds at `now`. Clock skew into the future counts as zero.
    pub fn age_at(&self, now: f64) -> f64 {
        (now - self.timestamp).max(0.0)
    }

    /// `ttl_secs = None` never expires; otherwise expired once `age > ttl`.
    pub fn is_expired(&self, ttl_secs: Option<u64>, now: f64) -> bool {
        match ttl_secs {
            Some(ttl) => self.age_at(now) > ttl as f64,
            None => false,
        }
    }

    /// Read and parse a record file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Current wall-clock time as fractional seconds since the epoch.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
