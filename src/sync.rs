//! Sync engine: reconciles every tracked blog's feed against storage.
//!
//! A pass pages through the tracked blogs and spawns one task per blog as
//! soon as its page arrives. Each blog task:
//!
//! 1. pages through the blog's known posts to build the set of known URLs,
//! 2. reads the feed once,
//! 3. keeps entries whose URL is not known (feed order, first occurrence),
//! 4. fetches each new post's body in turn (empty on failure),
//! 5. persists each post on its own.
//!
//! Duplicate inserts from overlapping passes are expected and reported by
//! the store as `Conflict`; they are logged at debug level and skipped.
//! Every storage call is bounded by `storage_timeout`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;

use crate::config::SyncConfig;
use crate::error::{BlogSyncError, StoreError, SyncError};
use crate::feed::FeedReader;
use crate::models::{Blog, FeedEntry, NewPost};
use crate::store::Store;

/// Tunables for a [`Syncer`].
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub blog_batch_size: i64,
    pub post_batch_size: i64,
    pub storage_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            blog_batch_size: config.blog_batch_size,
            post_batch_size: config.post_batch_size,
            storage_timeout: config.storage_timeout(),
        }
    }
}

/// Outcome counters for one blog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlogReport {
    pub blog_id: i64,
    /// Entries listed by the feed.
    pub discovered: usize,
    /// Entries not yet known to storage.
    pub new_posts: usize,
    pub created: usize,
    pub conflicts: usize,
    pub persist_failures: usize,
    pub body_failures: usize,
}

/// Outcome counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Blogs dispatched.
    pub blogs: usize,
    /// Blogs whose sync ended early (known-post listing, feed, or panic).
    pub blogs_failed: usize,
    pub posts_discovered: usize,
    pub posts_new: usize,
    pub created: usize,
    pub conflicts: usize,
    pub persist_failures: usize,
    pub body_failures: usize,
    pub elapsed_ms: u64,
}

impl SyncReport {
    fn absorb(&mut self, blog: &BlogReport) {
        self.posts_discovered += blog.discovered;
        self.posts_new += blog.new_posts;
        self.created += blog.created;
        self.conflicts += blog.conflicts;
        self.persist_failures += blog.persist_failures;
        self.body_failures += blog.body_failures;
    }
}

/// The sync engine. Cloning is cheap and shares the store and reader.
pub struct Syncer<S, R> {
    store: Arc<S>,
    reader: Arc<R>,
    settings: SyncSettings,
}

impl<S, R> Clone for Syncer<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reader: Arc::clone(&self.reader),
            settings: self.settings,
        }
    }
}

impl<S, R> Syncer<S, R>
where
    S: Store + 'static,
    R: FeedReader + 'static,
{
    pub fn new(store: Arc<S>, reader: Arc<R>, settings: SyncSettings) -> Self {
        Self {
            store,
            reader,
            settings,
        }
    }

    /// Run one full pass over every tracked blog.
    ///
    /// Returns an error only when the blog list itself cannot be read; in
    /// that case blogs already dispatched are still waited for.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let limit = self.settings.blog_batch_size;
        let mut report = SyncReport::default();
        let mut tasks = JoinSet::new();
        let mut offset = 0;

        let listing = loop {
            match self.bounded(self.store.list_blogs(limit, offset)).await {
                Ok(page) if page.is_empty() => break Ok(()),
                Ok(page) => {
                    for blog in page {
                        report.blogs += 1;
                        let this = self.clone();
                        tasks.spawn(async move {
                            let result = this.sync_blog(&blog).await;
                            if let Err(err) = &result {
                                tracing::warn!(
                                    blog_id = blog.id,
                                    feed_url = %blog.feed_url,
                                    error = %err,
                                    "blog sync failed"
                                );
                            }
                            result
                        });
                    }
                    offset += limit;
                }
                Err(source) => break Err(SyncError::ListBlogs { offset, source }),
            }
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(blog)) => report.absorb(&blog),
                Ok(Err(_)) => report.blogs_failed += 1,
                Err(err) => {
                    tracing::error!(error = %err, "blog sync task aborted");
                    report.blogs_failed += 1;
                }
            }
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        listing?;

        tracing::info!(
            blogs = report.blogs,
            failed = report.blogs_failed,
            new = report.posts_new,
            created = report.created,
            elapsed_ms = report.elapsed_ms,
            "sync pass complete"
        );
        Ok(report)
    }

    /// Run a pass now and then on every `interval` tick, forever.
    ///
    /// Each pass is its own task, so a slow pass never delays the next tick
    /// and passes may overlap.
    pub async fn run_forever(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(err) = this.run_once().await {
                    tracing::error!(error = %err, "sync pass failed");
                }
            });
        }
    }

    async fn sync_blog(&self, blog: &Blog) -> Result<BlogReport, BlogSyncError> {
        let known = self
            .known_urls(blog.id)
            .await
            .map_err(BlogSyncError::KnownPosts)?;
        let entries = self
            .reader
            .list_entries(blog)
            .await
            .map_err(BlogSyncError::Feed)?;

        let mut report = BlogReport {
            blog_id: blog.id,
            discovered: entries.len(),
            ..Default::default()
        };
        let fresh = delta(&known, entries);
        report.new_posts = fresh.len();

        let mut posts = Vec::with_capacity(fresh.len());
        for entry in fresh {
            let body = match self.reader.fetch_post_body(&entry.url).await {
                Ok(body) => body,
                Err(err) => {
                    tracing::warn!(url = %entry.url, error = %err, "post body unavailable");
                    report.body_failures += 1;
                    String::new()
                }
            };
            posts.push(NewPost::from_entry(blog.id, entry, body));
        }

        for post in &posts {
            match self.bounded(self.store.create_post(post)).await {
                Ok(id) => {
                    tracing::debug!(blog_id = blog.id, post_id = id, url = %post.url, "created post");
                    report.created += 1;
                }
                Err(StoreError::Conflict(what)) => {
                    tracing::debug!(blog_id = blog.id, "skipping existing {what}");
                    report.conflicts += 1;
                }
                Err(err) => {
                    tracing::warn!(blog_id = blog.id, url = %post.url, error = %err, "failed to store post");
                    report.persist_failures += 1;
                }
            }
        }

        if report.new_posts > 0 {
            tracing::info!(
                blog_id = blog.id,
                title = %blog.title,
                new = report.new_posts,
                created = report.created,
                "blog synced"
            );
        }
        Ok(report)
    }

    async fn known_urls(&self, blog_id: i64) -> Result<HashSet<String>, StoreError> {
        let limit = self.settings.post_batch_size;
        let mut known = HashSet::new();
        let mut offset = 0;
        loop {
            let page = self
                .bounded(self.store.list_posts_by_blog(blog_id, limit, offset))
                .await?;
            if page.is_empty() {
                return Ok(known);
            }
            known.extend(page.into_iter().map(|p| p.url));
            offset += limit;
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.settings.storage_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(limit)))
    }
}

/// Entries whose URL is not in `known`, in feed order. Repeats of a URL
/// within the same feed are dropped after the first.
pub fn delta(known: &HashSet<String>, entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !known.contains(&e.url) && seen.insert(e.url.clone()))
        .collect()
}
