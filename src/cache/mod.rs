//! File-backed Strava response cache with per-category TTL.

pub mod location;
pub mod policy;
pub mod record;
pub mod response_cache;

pub use location::RecordLocation;
pub use policy::{TtlPolicy, DEFAULT_TTL_SECS};
pub use record::CacheRecord;
pub use response_cache::{CacheStats, ResponseCache};
