//! Adding blogs to the tracked set.
//!
//! A blog is provisioned from its feed: the feed is fetched once to learn
//! the title and the site it links back to, then the blog row is created.

use anyhow::{Context, Result};
use url::Url;

use crate::error::StoreError;
use crate::feed::FeedReader;
use crate::models::{Blog, NewBlog};
use crate::store::Store;

/// Result of [`add_blog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddBlogOutcome {
    Created(Blog),
    /// A blog with the same feed and site URL is already tracked.
    AlreadyExists,
}

/// Fetch `feed_url`, derive the blog's metadata, and store it.
///
/// The site URL is `site_url_override` when given, else the feed's own
/// link, else the root of the feed URL. An empty feed title falls back to
/// the site URL.
pub async fn add_blog<S, R>(
    store: &S,
    reader: &R,
    feed_url: &str,
    site_url_override: Option<&str>,
) -> Result<AddBlogOutcome>
where
    S: Store + ?Sized,
    R: FeedReader + ?Sized,
{
    let metadata = reader
        .fetch_blog_metadata(feed_url)
        .await
        .with_context(|| format!("Failed to read feed {}", feed_url))?;

    let site_url = match site_url_override {
        Some(url) => url.to_string(),
        None => metadata
            .site_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| site_root(feed_url)),
    };
    let title = if metadata.title.trim().is_empty() {
        site_url.clone()
    } else {
        metadata.title
    };

    let new_blog = NewBlog {
        feed_url: feed_url.to_string(),
        site_url,
        title,
    };
    match store.create_blog(&new_blog).await {
        Ok(blog) => {
            tracing::info!(blog_id = blog.id, title = %blog.title, "added blog");
            Ok(AddBlogOutcome::Created(blog))
        }
        Err(StoreError::Conflict(_)) => Ok(AddBlogOutcome::AlreadyExists),
        Err(e) => Err(e).context("Failed to store blog"),
    }
}

fn site_root(feed_url: &str) -> String {
    Url::parse(feed_url)
        .and_then(|u| u.join("/"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| feed_url.to_string())
}
