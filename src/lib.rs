//! stravacache: a persistent, per-category TTL cache for Strava API responses.
//!
//! The web layer asks the cache before calling the API and stores whatever
//! it fetched afterwards. The cache never fails a request: every storage
//! problem turns into a miss or a skipped write.
//!
//! ```no_run
//! use serde_json::json;
//! use stravacache::{CacheConfig, ResponseCache};
//!
//! let cache = ResponseCache::new(CacheConfig::load()?);
//! if cache.get("segment", "229781").is_none() {
//!     let fetched = json!({"id": 229781, "name": "Hawk Hill"});
//!     cache.set("segment", "229781", &fetched);
//! }
//! println!("{} records cached", cache.stats().total_records);
//! # Ok::<(), stravacache::CacheError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheRecord, CacheStats, RecordLocation, ResponseCache, TtlPolicy};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
