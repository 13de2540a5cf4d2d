//! Stats and clear command handlers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use stravacache::{CacheStats, ResponseCache};

/// Handle `stravacache stats`.
pub(crate) fn cmd_stats(cache: &ResponseCache, json: bool) -> Result<()> {
    let stats = cache.stats();

    if json {
        let out = serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?;
        println!("{}", out);
        return Ok(());
    }

    print!("{}", render_stats(cache, &stats));
    Ok(())
}

/// Handle `stravacache clear-expired`.
pub(crate) fn cmd_clear_expired(cache: &ResponseCache) -> Result<()> {
    let removed = cache.clear_expired();
    println!("Removed {} expired cache entr{}.", removed, plural_y(removed));
    Ok(())
}

/// Handle `stravacache clear [--category C]`.
pub(crate) fn cmd_clear(cache: &ResponseCache, category: Option<&str>) -> Result<()> {
    match category {
        Some(category) => {
            let removed = cache.clear_category(category);
            println!(
                "Removed {} '{}' cache entr{}.",
                removed,
                category,
                plural_y(removed)
            );
        }
        None => {
            let removed = cache.clear_all();
            println!("Removed {} cache entr{}.", removed, plural_y(removed));
        }
    }
    Ok(())
}

fn render_stats(cache: &ResponseCache, stats: &CacheStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Cache directory: {}\n", cache.root().display()));
    out.push_str(&format!(
        "Records: {} ({})\n",
        stats.total_records,
        human_bytes(stats.total_bytes)
    ));
    if stats.unreadable_records > 0 {
        out.push_str(&format!("Unreadable: {}\n", stats.unreadable_records));
    }
    if let (Some(oldest), Some(newest)) = (stats.oldest_stored_at, stats.newest_stored_at) {
        out.push_str(&format!("Oldest: {}\n", format_timestamp(oldest)));
        out.push_str(&format!("Newest: {}\n", format_timestamp(newest)));
    }

    if stats.count_by_category.is_empty() {
        return out;
    }

    out.push('\n');
    out.push_str(&format!("{:<16} {:<10} {:<12}\n", "Category", "Records", "TTL"));
    out.push_str(&format!("{}\n", "-".repeat(40)));
    for (category, count) in &stats.count_by_category {
        let ttl = match cache.policy().ttl_for(category) {
            Some(secs) => format!("{}s", secs),
            None => "never".to_string(),
        };
        out.push_str(&format!("{:<16} {:<10} {:<12}\n", category, count, ttl));
    }
    out
}

fn format_timestamp(secs: f64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{secs}"))
}

fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}
