//! Storage abstraction for feedsync.
//!
//! The [`Store`] trait is everything the sync engine and the provisioning
//! path need from a backend. Identity is the backend's job: it assigns ids
//! and enforces the uniqueness constraints that make concurrent, overlapping
//! sync passes safe.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`list_blogs`](Store::list_blogs) | Page through tracked blogs, ordered by id |
//! | [`list_posts_by_blog`](Store::list_posts_by_blog) | Page through one blog's known posts |
//! | [`create_post`](Store::create_post) | Insert a post; `Conflict` on duplicate `(blog_id, url)` |
//! | [`create_blog`](Store::create_blog) | Insert a blog; `Conflict` on duplicate `(feed_url, site_url)` |
//! | [`stats`](Store::stats) | Counts for the `stats` command |
//!
//! Pagination is offset based and stable: an empty page means the end.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{Blog, NewBlog, NewPost, Post};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Summary counts over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub blogs: i64,
    pub posts: i64,
    /// Posts ingested without body text (fetch failed or page was empty).
    pub empty_bodies: i64,
    pub newest_post: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_blogs(&self, limit: i64, offset: i64) -> Result<Vec<Blog>, StoreError>;

    async fn list_posts_by_blog(
        &self,
        blog_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, StoreError>;

    /// Insert a post and return its id.
    async fn create_post(&self, post: &NewPost) -> Result<i64, StoreError>;

    /// Insert a blog and return it with its assigned id.
    async fn create_blog(&self, blog: &NewBlog) -> Result<Blog, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
