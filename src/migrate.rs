use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an existing pool. Every statement is idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Tracked blogs; (feed_url, site_url) identifies a blog
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blogs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            feed_url TEXT NOT NULL,
            site_url TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(feed_url, site_url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Ingested posts; url is the identity key within a blog
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            blog_id INTEGER NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            UNIQUE(blog_id, url),
            FOREIGN KEY (blog_id) REFERENCES blogs(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_blog_id ON posts(blog_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_updated_at ON posts(updated_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
