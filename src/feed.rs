//! Feed access: reading feeds and post bodies from the network.
//!
//! [`FeedReader`] is the seam the sync engine talks to. [`HttpFeedReader`]
//! is the production implementation; tests substitute scripted readers.
//! Readers are stateless apart from their HTTP client and never retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use crate::config::HttpConfig;
use crate::error::FeedError;
use crate::feed_parser::{parse_feed, ParsedFeed};
use crate::models::{Blog, BlogMetadata, FeedEntry};
use crate::sanitize::HtmlCleaner;

/// Source of feed documents and post bodies.
#[async_trait]
pub trait FeedReader: Send + Sync {
    /// Fetch and parse the feed at `feed_url`, returning channel metadata.
    async fn fetch_blog_metadata(&self, feed_url: &str) -> Result<BlogMetadata, FeedError>;

    /// Fetch the blog's feed and return every entry it currently lists, in
    /// document order. Each call fetches again.
    async fn list_entries(&self, blog: &Blog) -> Result<Vec<FeedEntry>, FeedError>;

    /// Fetch a post page and reduce it to sanitized plain text.
    async fn fetch_post_body(&self, post_url: &str) -> Result<String, FeedError>;
}

/// [`FeedReader`] over HTTP(S) with `reqwest`.
pub struct HttpFeedReader {
    client: reqwest::Client,
    cleaner: Arc<HtmlCleaner>,
}

impl HttpFeedReader {
    pub fn new(config: &HttpConfig, cleaner: Arc<HtmlCleaner>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, cleaner })
    }

    /// GET `url` and return the body bytes of a successful response.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let parsed = Url::parse(url).map_err(|e| FeedError::fetch(url, e))?;

        tracing::debug!(url = %url, "fetching");
        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FeedError::fetch(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| FeedError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<ParsedFeed, FeedError> {
        let xml = self.fetch_bytes(feed_url).await?;
        // Taken after the fetch so undated entries are never older than it
        let fetched_at = Utc::now();
        parse_feed(feed_url, &xml, fetched_at)
    }
}

#[async_trait]
impl FeedReader for HttpFeedReader {
    async fn fetch_blog_metadata(&self, feed_url: &str) -> Result<BlogMetadata, FeedError> {
        Ok(self.fetch_feed(feed_url).await?.metadata)
    }

    async fn list_entries(&self, blog: &Blog) -> Result<Vec<FeedEntry>, FeedError> {
        Ok(self.fetch_feed(&blog.feed_url).await?.entries)
    }

    async fn fetch_post_body(&self, post_url: &str) -> Result<String, FeedError> {
        let raw = self.fetch_bytes(post_url).await?;
        Ok(self.cleaner.clean(&raw))
    }
}
