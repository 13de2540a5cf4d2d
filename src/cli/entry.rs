//! Single-record command handlers: get, set, delete.

use anyhow::{Context, Result};

use stravacache::ResponseCache;

/// Handle `stravacache get <category> <key>`.
pub(crate) fn cmd_get(cache: &ResponseCache, category: &str, key: &str) -> Result<()> {
    let Some(payload) = cache.get(category, key) else {
        anyhow::bail!("{}/{} is not cached", category, key);
    };
    let out = serde_json::to_string_pretty(&payload).context("Failed to render payload")?;
    println!("{}", out);
    Ok(())
}

/// Handle `stravacache set <category> <key> <json>`.
///
/// The cache itself never reports write failures, so the record is read back
/// to tell the operator whether it landed.
pub(crate) fn cmd_set(cache: &ResponseCache, category: &str, key: &str, raw: &str) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(raw).context("Payload must be a JSON document")?;
    cache.set(category, key, &payload);

    if !cache.contains(category, key) {
        anyhow::bail!(
            "Failed to cache {}/{} under {}",
            category,
            key,
            cache.root().display()
        );
    }
    println!("Cached {}/{}", category, key);
    Ok(())
}

/// Handle `stravacache delete <category> <key>`.
pub(crate) fn cmd_delete(cache: &ResponseCache, category: &str, key: &str) -> Result<()> {
    if cache.delete(category, key) {
        println!("Deleted {}/{}", category, key);
    } else {
        println!("{}/{} was not cached", category, key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stravacache::TtlPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), TtlPolicy::bounded());
        cmd_set(&cache, "segment", "1", r#"{"name": "Hawk Hill"}"#).unwrap();
        assert!(cmd_get(&cache, "segment", "1").is_ok());
    }

    #[test]
    fn test_get_miss_is_error() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), TtlPolicy::bounded());
        let err = cmd_get(&cache, "segment", "404").unwrap_err();
        assert!(err.to_string().contains("not cached"));
    }

    #[test]
    fn test_set_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), TtlPolicy::bounded());
        assert!(cmd_set(&cache, "segment", "1", "{nope").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_reports_unwritable_root() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cache = ResponseCache::open(&blocker, TtlPolicy::bounded());
        assert!(cmd_set(&cache, "segment", "1", "1").is_err());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), TtlPolicy::bounded());
        assert!(cmd_delete(&cache, "segment", "1").is_ok());
    }
}
