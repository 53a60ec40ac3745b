//! Database statistics and health overview.
//!
//! A quick summary of what has been ingested: blog and post counts, how
//! many posts came in without a body, and how fresh the newest post is.
//! Used by `feedsync stats` to check that syncs are actually landing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db;
use crate::store::{SqliteStore, Store, StoreStats};

/// Gather summary counts from any store.
pub async fn collect<S: Store + ?Sized>(store: &S) -> Result<StoreStats> {
    store.stats().await.context("Failed to read store statistics")
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let stats = collect(&store).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("feedsync Database Stats");
    println!("=======================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Blogs:        {}", stats.blogs);
    println!("  Posts:        {}", stats.posts);
    println!(
        "  Empty bodies: {} / {}",
        stats.empty_bodies, stats.posts
    );
    println!(
        "  Newest post:  {}",
        stats
            .newest_post
            .map(format_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();

    store.pool().close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to now (e.g. "3 hours ago"). Older than a
/// month, or in the future, falls back to a plain date.
fn format_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();
    let plain = || ts.format("%Y-%m-%d %H:%M").to_string();

    if delta < 0 {
        return plain();
    }
    let (n, unit) = match delta {
        0..=59 => return "just now".to_string(),
        60..=3599 => (delta / 60, "min"),
        3600..=86399 => (delta / 3600, "hour"),
        86400..=2591999 => (delta / 86400, "day"),
        _ => return plain(),
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPost;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[test]
    fn bytes_pick_a_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(format_relative(now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(1)), "1 min ago");
        assert_eq!(format_relative(now - Duration::hours(5)), "5 hours ago");
        let old = now - Duration::days(90);
        assert_eq!(format_relative(old), old.format("%Y-%m-%d %H:%M").to_string());
    }

    #[tokio::test]
    async fn collect_counts_empty_bodies() {
        let store = MemoryStore::new();
        let older = Utc::now() - Duration::days(1);
        let newer = Utc::now();
        for (url, body, at) in [("https://a/1", "", older), ("https://a/2", "text", newer)] {
            store
                .create_post(&NewPost {
                    blog_id: 1,
                    url: url.to_string(),
                    title: url.to_string(),
                    updated_at: at,
                    body: body.to_string(),
                })
                .await
                .unwrap();
        }
        let stats = collect(&store).await.unwrap();
        assert_eq!(stats.posts, 2);
        assert_eq!(stats.empty_bodies, 1);
        assert_eq!(stats.newest_post, Some(newer));
    }
}
