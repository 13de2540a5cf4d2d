//! Strava API response cache with per-category TTL and JSON persistence.
//!
//! Every record is its own file, `<category>_<key>.json`, in the storage
//! root (see [`location`](super::location)). Writes go to a temp file in the
//! same directory and are renamed over the target, so readers see either the
//! previous record or the new one, never a torn write.
//!
//! The cache is best-effort: no operation returns an error. Read failures
//! are misses, write failures are logged and dropped, and corrupt records
//! are deleted on sight. A record that could be neither replaced nor removed
//! is shadowed in memory so this process never serves it again.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

use super::location::{self, RecordLocation};
use super::policy::TtlPolicy;
use super::record::{now_secs, CacheRecord};

/// Prefix for in-flight writes. Together with the `.tmp` suffix this keeps
/// temp files out of every scan.
const TEMP_PREFIX: &str = ".stravacache-";
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this are leftovers of an interrupted write.
const TEMP_GRACE: Duration = Duration::from_secs(60 * 60);

/// File-backed response cache.
///
/// `Send + Sync`; share it behind an `Arc` between request handlers. Clones
/// share the same set of shadowed records.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
    policy: TtlPolicy,
    /// File names of records whose overwrite and removal both failed.
    shadowed: Arc<Mutex<HashSet<String>>>,
}

impl ResponseCache {
    /// Create a cache from loaded configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::open(config.cache_dir, config.policy)
    }

    /// Create a cache rooted at `root`. The directory is created if absent;
    /// failure to do so is logged and retried on the next write.
    pub fn open(root: impl Into<PathBuf>, policy: TtlPolicy) -> Self {
        let root = root.into();
        if let Err(e) = fs::create_dir_all(&root) {
            warn!(path = %root.display(), error = %e, "Failed to create cache directory");
        }
        Self {
            root,
            policy,
            shadowed: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Path of the record for `(category, key)`, whether or not it exists.
    pub fn record_path(&self, category: &str, key: &str) -> PathBuf {
        self.root.join(location::file_name(category, key))
    }

    /// Look up a cached payload. Returns `None` if the record is absent,
    /// unreadable, corrupt, or older than its category's TTL.
    ///
    /// Corrupt and expired records are deleted as a side effect.
    pub fn get(&self, category: &str, key: &str) -> Option<serde_json::Value> {
        self.get_at(category, key, now_secs())
    }

    /// Like [`get`](Self::get), deserializing the payload into `T`.
    ///
    /// A payload that does not fit `T` is a miss but is left on disk; it is
    /// valid JSON that another caller may read differently.
    pub fn get_as<T: DeserializeOwned>(&self, category: &str, key: &str) -> Option<T> {
        let value = self.get(category, key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(category, key, error = %e, "Cached payload has unexpected shape");
                None
            }
        }
    }

    /// `true` if [`get`](Self::get) would return a payload.
    pub fn contains(&self, category: &str, key: &str) -> bool {
        self.get(category, key).is_some()
    }

    /// Store `payload` under `(category, key)`, replacing any previous record.
    ///
    /// Never fails observably. If the write cannot complete, the previous
    /// record is removed so the next read misses instead of serving data the
    /// caller just tried to replace. When even the removal fails (read-only
    /// root), the record is shadowed until the next successful `set` or
    /// `delete`.
    pub fn set<T: Serialize + ?Sized>(&self, category: &str, key: &str, payload: &T) {
        let path = self.record_path(category, key);
        let result = serde_json::to_value(payload)
            .map_err(CacheError::from)
            .and_then(|data| self.write_record(&path, &CacheRecord::new(data)));

        match result {
            Ok(()) => {
                self.unshadow(category, key);
                debug!(category, key, "Cached response");
            }
            Err(e) => {
                warn!(category, key, error = %e, "Failed to write cache record");
                self.discard(category, key, &path);
            }
        }
    }

    /// Remove the record for `(category, key)`. Returns `true` if one existed.
    pub fn delete(&self, category: &str, key: &str) -> bool {
        let path = self.record_path(category, key);
        let removed = remove_record(&path);
        if removed || !path.exists() {
            self.unshadow(category, key);
        } else {
            self.shadow(category, key);
        }
        removed
    }

    /// Remove every record older than its category's TTL, plus any record
    /// that cannot be read. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        self.clear_expired_at(now_secs())
    }

    /// Remove every record unconditionally. Returns how many were removed.
    ///
    /// Stale temp files are swept too; in-flight writes are left alone.
    pub fn clear_all(&self) -> usize {
        self.sweep_temp_files(now_secs());
        let removed = self
            .record_files()
            .into_iter()
            .filter(|(path, _)| remove_record(path))
            .count();
        debug!(removed, "Cleared cache");
        removed
    }

    /// Remove every record of one category. Returns how many were removed.
    pub fn clear_category(&self, category: &str) -> usize {
        let removed = self
            .record_files()
            .into_iter()
            .filter(|(_, loc)| loc.category == category)
            .filter(|(path, _)| remove_record(path))
            .count();
        debug!(category, removed, "Cleared cache category");
        removed
    }

    /// Scan the storage root and report aggregate statistics.
    ///
    /// Unreadable records are still counted by name and size; they only
    /// drop out of the timestamp range.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for (path, loc) in self.record_files() {
            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping record in stats");
                    continue;
                }
            };
            stats.total_records += 1;
            stats.total_bytes += size;
            *stats.count_by_category.entry(loc.category).or_insert(0) += 1;

            match CacheRecord::read_from(&path) {
                Ok(record) => stats.observe_timestamp(record.timestamp),
                Err(_) => stats.unreadable_records += 1,
            }
        }
        stats
    }

    /// Number of record files currently in the storage root.
    pub fn len(&self) -> usize {
        self.record_files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- private helpers ---------------------------------------------------

    fn get_at(&self, category: &str, key: &str, now: f64) -> Option<serde_json::Value> {
        if self.is_shadowed(category, key) {
            debug!(category, key, "Cache record shadowed after failed write");
            return None;
        }

        let path = self.record_path(category, key);
        let record = match CacheRecord::read_from(&path) {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                debug!(category, key, "Cache miss");
                return None;
            }
            Err(CacheError::Json(e)) => {
                warn!(category, key, error = %e, "Cache record is corrupt, removing");
                remove_record(&path);
                return None;
            }
            Err(e) => {
                warn!(category, key, error = %e, "Failed to read cache record");
                return None;
            }
        };

        if record.is_expired(self.policy.ttl_for(category), now) {
            debug!(category, key, "Cache entry expired, removing");
            remove_record(&path);
            return None;
        }

        debug!(category, key, "Cache hit");
        Some(record.data)
    }

    fn clear_expired_at(&self, now: f64) -> usize {
        self.sweep_temp_files(now);
        let mut removed = 0;
        for (path, loc) in self.record_files() {
            let stale = match CacheRecord::read_from(&path) {
                Ok(record) => record.is_expired(self.policy.ttl_for(&loc.category), now),
                Err(e) if e.is_not_found() => false,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Unreadable cache record, removing");
                    true
                }
            };
            if stale && remove_record(&path) {
                removed += 1;
            }
        }
        debug!(removed, "Cleared expired cache entries");
        removed
    }

    /// Remove `path` after a failed write, shadowing it if it survives.
    fn discard(&self, category: &str, key: &str, path: &Path) {
        if remove_record(path) || !path.exists() {
            self.unshadow(category, key);
        } else {
            warn!(category, key, "Stale cache record could not be removed, shadowing it");
            self.shadow(category, key);
        }
    }

    fn shadowed(&self) -> MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still a valid set of names.
        self.shadowed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn shadow(&self, category: &str, key: &str) {
        self.shadowed().insert(location::file_name(category, key));
    }

    fn unshadow(&self, category: &str, key: &str) {
        self.shadowed().remove(&location::file_name(category, key));
    }

    fn is_shadowed(&self, category: &str, key: &str) -> bool {
        self.shadowed().contains(&location::file_name(category, key))
    }

    /// Delete temp files left by writes that never reached `persist`.
    /// Returns how many were removed.
    fn sweep_temp_files(&self, now: f64) -> usize {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };
        let now = UNIX_EPOCH + Duration::from_secs_f64(now.max(0.0));

        let mut removed = 0;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let name = entry.file_name();
            let is_temp = name
                .to_str()
                .is_some_and(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(TEMP_SUFFIX));
            if !is_temp {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let stale = meta.is_file()
                && meta
                    .modified()
                    .ok()
                    .and_then(|mtime| now.duration_since(mtime).ok())
                    .is_some_and(|age| age > TEMP_GRACE);
            if stale && remove_record(&entry.path()) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "Removed leftover temp files");
        }
        removed
    }

    fn write_record(&self, path: &Path, record: &CacheRecord) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        let json = record.to_json()?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|e| CacheError::io(&self.root, e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.flush())
            .map_err(|e| CacheError::io(tmp.path(), e))?;

        // Dropping the temp file on failure cleans it up.
        tmp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
        Ok(())
    }

    /// Every record file in the root with its decoded location. Directories,
    /// temp files and foreign files are skipped.
    fn record_files(&self) -> Vec<(PathBuf, RecordLocation)> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %self.root.display(),
                        error = %e,
                        "Failed to scan cache directory"
                    );
                }
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name();
                let loc = RecordLocation::parse(name.to_str()?).ok()?;
                Some((entry.path(), loc))
            })
            .collect()
    }
}

/// Delete a record file. Returns `true` if a file was removed.
fn remove_record(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove cache record");
            false
        }
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of record files in the storage root.
    pub total_records: usize,
    /// Record count per category.
    pub count_by_category: BTreeMap<String, usize>,
    /// Sum of record file sizes in bytes.
    pub total_bytes: u64,
    /// Earliest `timestamp` among readable records.
    pub oldest_stored_at: Option<f64>,
    /// Latest `timestamp` among readable records.
    pub newest_stored_at: Option<f64>,
    /// Records that exist but could not be parsed.
    pub unreadable_records: usize,
}

impl CacheStats {
    fn observe_timestamp(&mut self, ts: f64) {
        self.oldest_stored_at = Some(self.oldest_stored_at.map_or(ts, |t| t.min(ts)));
        self.newest_stored_at = Some(self.newest_stored_at.map_or(ts, |t| t.max(ts)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_cache(tmp: &TempDir) -> ResponseCache {
        ResponseCache::open(tmp.path().join("cache"), TtlPolicy::bounded())
    }

    /// Write a record with an explicit timestamp, bypassing `set`.
    fn write_backdated(cache: &ResponseCache, category: &str, key: &str, ts: f64) {
        let record = CacheRecord::stored_at(ts, json!({"backdated": true}));
        fs::write(cache.record_path(category, key), record.to_json().unwrap()).unwrap();
    }

    #[test]
    fn test_cache_hit_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        assert!(cache.get("segment", "229781").is_none());
        cache.set("segment", "229781", &json!({"name": "Hawk Hill"}));
        assert_eq!(
            cache.get("segment", "229781"),
            Some(json!({"name": "Hawk Hill"}))
        );
    }

    #[test]
    fn test_open_creates_root() {
        let tmp = TempDir::new().unwrap();
        let cache = ResponseCache::open(tmp.path().join("a").join("b"), TtlPolicy::bounded());
        assert!(cache.root().is_dir());
    }

    #[test]
    fn test_record_file_layout() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("efforts", "229781_1234", &json!([1, 2]));

        let path = tmp.path().join("cache").join("efforts_229781_1234.json");
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["data"], json!([1, 2]));
        assert!(raw["timestamp"].as_f64().unwrap() > 1.6e9);
    }

    #[test]
    fn test_overwrite_replaces() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("activity", "1", &json!({"v": 1, "extra": "field"}));
        cache.set("activity", "1", &json!({"v": 2}));
        assert_eq!(cache.get("activity", "1"), Some(json!({"v": 2})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_typed_get() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Segment {
            id: u64,
            name: String,
        }

        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        let seg = Segment {
            id: 7,
            name: "Alpe".into(),
        };
        cache.set("segment", "7", &seg);
        assert_eq!(cache.get_as::<Segment>("segment", "7"), Some(seg));

        // Wrong shape is a miss but the record stays
        assert!(cache.get_as::<Vec<u64>>("segment", "7").is_none());
        assert!(cache.contains("segment", "7"));
    }

    #[test]
    fn test_ttl_expiry_boundary() {
        let tmp = TempDir::new().unwrap();
        let cache = ResponseCache::open(
            tmp.path(),
            TtlPolicy::unbounded().with_category("efforts", Some(100)),
        );
        cache.set("efforts", "k", &json!(1));
        let stored = CacheRecord::read_from(&cache.record_path("efforts", "k"))
            .unwrap()
            .timestamp;

        assert!(cache.get_at("efforts", "k", stored + 99.9).is_some());
        assert!(cache.get_at("efforts", "k", stored + 100.1).is_none());
        assert!(!cache.record_path("efforts", "k").exists());
        assert_eq!(cache.stats().total_records, 0);
    }

    #[test]
    fn test_default_ttl_for_unknown_category() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        write_backdated(&cache, "athlete", "1", now_secs() - 3_700.0);
        write_backdated(&cache, "segment", "1", now_secs() - 3_700.0);
        assert!(cache.get("athlete", "1").is_none());
        assert!(cache.get("segment", "1").is_some());
    }

    #[test]
    fn test_unbounded_never_expires() {
        let tmp = TempDir::new().unwrap();
        let cache = ResponseCache::open(tmp.path(), TtlPolicy::unbounded());
        write_backdated(&cache, "segment", "1", 0.0);
        assert!(cache.get("segment", "1").is_some());
        assert_eq!(cache.clear_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_corrupt_record_self_heals() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        let path = cache.record_path("segment", "9");
        fs::write(&path, "{\"timestamp\": 1.0, \"da").unwrap();

        assert_eq!(cache.stats().unreadable_records, 1);
        assert!(cache.get("segment", "9").is_none());
        assert!(!path.exists());
        assert_eq!(cache.stats().total_records, 0);
    }

    #[test]
    fn test_record_missing_timestamp_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        fs::write(cache.record_path("segment", "9"), r#"{"data": 1}"#).unwrap();
        assert!(cache.get("segment", "9").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_idempotent() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("streams", "5", &json!({"heartrate": [120, 130]}));
        assert!(cache.delete("streams", "5"));
        assert!(!cache.delete("streams", "5"));
        assert!(cache.get("streams", "5").is_none());
    }

    #[test]
    fn test_clear_expired_mixed() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        let now = now_secs();
        write_backdated(&cache, "efforts", "old", now - 7_200.0);
        write_backdated(&cache, "efforts", "new", now - 60.0);
        write_backdated(&cache, "activity", "old", now - 7_200.0);
        fs::write(cache.record_path("segment", "bad"), "not json").unwrap();

        assert_eq!(cache.clear_expired(), 2);
        let stats = cache.stats();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.count_by_category.get("efforts"), Some(&1));
        assert_eq!(stats.count_by_category.get("activity"), Some(&1));
    }

    #[test]
    fn test_clear_all_and_category() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        for i in 0..3 {
            cache.set("segment", &i.to_string(), &json!(i));
            cache.set("activity", &i.to_string(), &json!(i));
        }
        assert_eq!(cache.clear_category("segment"), 3);
        assert_eq!(cache.len(), 3);
        assert!(cache.get("activity", "0").is_some());

        assert_eq!(cache.clear_all(), 3);
        assert_eq!(cache.stats().total_records, 0);
    }

    #[test]
    fn test_scans_ignore_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("segment", "1", &json!(1));
        fs::write(cache.root().join(".stravacache-abc.tmp"), "{").unwrap();
        fs::write(cache.root().join("README.txt"), "hi").unwrap();
        fs::create_dir(cache.root().join("nested_dir.json")).unwrap();

        assert_eq!(cache.stats().total_records, 1);
        assert_eq!(cache.clear_all(), 1);
        assert!(cache.root().join("README.txt").exists());
    }

    #[test]
    fn test_stats() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        write_backdated(&cache, "segment", "1", 1_000.0);
        write_backdated(&cache, "segment", "2", 3_000.0);
        write_backdated(&cache, "activity", "1", 2_000.0);

        let stats = cache.stats();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.count_by_category.values().sum::<usize>(), 3);
        assert_eq!(stats.count_by_category["segment"], 2);
        assert_eq!(stats.oldest_stored_at, Some(1_000.0));
        assert_eq!(stats.newest_stored_at, Some(3_000.0));
        assert!(stats.total_bytes > 0);
        assert_eq!(stats.unreadable_records, 0);
    }

    #[test]
    fn test_stats_empty() {
        let tmp = TempDir::new().unwrap();
        let stats = test_cache(&tmp).stats();
        assert_eq!(stats, CacheStats::default());
        assert!(stats.oldest_stored_at.is_none());
    }

    #[test]
    fn test_stats_serializes() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("segment", "1", &json!(1));
        let value = serde_json::to_value(cache.stats()).unwrap();
        assert_eq!(value["total_records"], json!(1));
        assert_eq!(value["count_by_category"]["segment"], json!(1));
    }

    #[test]
    fn test_write_failure_is_silent() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the directory should be blocks every write,
        // even for a privileged user.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let cache = ResponseCache::open(&blocker, TtlPolicy::bounded());

        cache.set("segment", "1", &json!({"x": 1}));
        assert!(cache.get("segment", "1").is_none());
        assert_eq!(cache.stats().total_records, 0);
        assert_eq!(cache.clear_expired(), 0);
        assert!(!cache.delete("segment", "1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_overwrite_in_read_only_root_is_a_miss() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("segment", "1", &json!({"v": "old"}));

        fs::set_permissions(cache.root(), fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users ignore directory permissions; nothing to test then.
        let writable = fs::write(cache.root().join("write-check"), "").is_ok();
        if !writable {
            cache.set("segment", "1", &json!({"v": "new"}));
            assert!(cache.record_path("segment", "1").exists());
            assert!(cache.get("segment", "1").is_none());
            assert!(!cache.contains("segment", "1"));
        }

        fs::set_permissions(cache.root(), fs::Permissions::from_mode(0o755)).unwrap();
        cache.set("segment", "1", &json!({"v": "newer"}));
        assert_eq!(cache.get("segment", "1"), Some(json!({"v": "newer"})));
    }

    #[test]
    fn test_shadowed_record_misses_until_rewritten() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("streams", "5", &json!([1]));

        cache.shadow("streams", "5");
        assert!(cache.get("streams", "5").is_none());
        // Shadowing hides the record without deleting it
        assert!(cache.record_path("streams", "5").exists());
        // Clones share the shadow set
        assert!(cache.clone().get("streams", "5").is_none());

        cache.set("streams", "5", &json!([2]));
        assert_eq!(cache.get("streams", "5"), Some(json!([2])));

        cache.shadow("streams", "5");
        assert!(cache.delete("streams", "5"));
        cache.set("streams", "5", &json!([3]));
        assert_eq!(cache.get("streams", "5"), Some(json!([3])));
    }

    #[test]
    fn test_clear_expired_sweeps_stale_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        let stale = cache.root().join(".stravacache-crashed.tmp");
        let fresh = cache.root().join(".stravacache-inflight.tmp");
        fs::write(&stale, "{\"timestamp\"").unwrap();
        fs::write(&fresh, "{\"timestamp\"").unwrap();
        let two_hours_ago = std::time::SystemTime::now() - Duration::from_secs(2 * 60 * 60);
        fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        assert_eq!(cache.clear_expired(), 0);
        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_clear_all_leaves_inflight_temp_files() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        cache.set("segment", "1", &json!(1));
        let fresh = cache.root().join(".stravacache-inflight.tmp");
        fs::write(&fresh, "").unwrap();

        assert_eq!(cache.clear_all(), 1);
        assert!(fresh.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let cache = test_cache(&tmp);
        for i in 0..5 {
            cache.set("segment", "1", &json!(i));
        }
        let names: Vec<_> = fs::read_dir(cache.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["segment_1.json".to_string()]);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_writes() {
        use std::sync::Arc;

        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(test_cache(&tmp));
        let big = |n: u64| json!({"n": n, "pad": "x".repeat(64 * 1024)});
        cache.set("streams", "1", &big(0));

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for n in 1..50 {
                    cache.set("streams", "1", &big(n));
                }
            })
        };
        for _ in 0..200 {
            let value = cache.get("streams", "1").expect("record must stay readable");
            assert_eq!(value["pad"].as_str().map(str::len), Some(64 * 1024));
        }
        writer.join().unwrap();
    }
}
