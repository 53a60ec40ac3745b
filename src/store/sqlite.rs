//! SQLite-backed [`Store`] implementation.
//!
//! Timestamps are stored as Unix seconds. Unique-constraint violations are
//! reported as [`StoreError::Conflict`]; every other database failure is
//! passed through as [`StoreError::Database`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::models::{Blog, NewBlog, NewPost, Post};

use super::{Store, StoreStats};

/// SQLite implementation of the [`Store`] trait over the `blogs` and
/// `posts` tables created by [`migrate`](crate::migrate).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Map a unique violation to `Conflict`, keeping everything else as is.
fn conflict_or(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_blogs(&self, limit: i64, offset: i64) -> Result<Vec<Blog>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, feed_url, site_url, title FROM blogs ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Blog {
                id: row.get("id"),
                feed_url: row.get("feed_url"),
                site_url: row.get("site_url"),
                title: row.get("title"),
            })
            .collect())
    }

    async fn list_posts_by_blog(
        &self,
        blog_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, blog_id, url, title, updated_at
            FROM posts
            WHERE blog_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(blog_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Post {
                id: row.get("id"),
                blog_id: row.get("blog_id"),
                url: row.get("url"),
                title: row.get("title"),
                updated_at: from_ts(row.get("updated_at")),
            })
            .collect())
    }

    async fn create_post(&self, post: &NewPost) -> Result<i64, StoreError> {
        let now = Utc::now().timestamp();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts (blog_id, url, title, updated_at, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(post.blog_id)
        .bind(&post.url)
        .bind(&post.title)
        .bind(post.updated_at.timestamp())
        .bind(&post.body)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, || format!("post {} for blog {}", post.url, post.blog_id)))?;

        Ok(id)
    }

    async fn create_blog(&self, blog: &NewBlog) -> Result<Blog, StoreError> {
        let now = Utc::now().timestamp();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO blogs (feed_url, site_url, title, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&blog.feed_url)
        .bind(&blog.site_url)
        .bind(&blog.title)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, || format!("blog {}", blog.feed_url)))?;

        Ok(Blog {
            id,
            feed_url: blog.feed_url.clone(),
            site_url: blog.site_url.clone(),
            title: blog.title.clone(),
        })
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let blogs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blogs")
            .fetch_one(&self.pool)
            .await?;

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS posts,
                COALESCE(SUM(CASE WHEN body = '' THEN 1 ELSE 0 END), 0) AS empty_bodies,
                MAX(updated_at) AS newest
            FROM posts
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let newest: Option<i64> = row.get("newest");
        Ok(StoreStats {
            blogs,
            posts: row.get("posts"),
            empty_bodies: row.get("empty_bodies"),
            newest_post: newest.map(from_ts),
        })
    }
}
