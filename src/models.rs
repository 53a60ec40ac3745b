//! Core data models used throughout feedsync.
//!
//! Blogs and posts are identified by storage-assigned integer ids; the
//! engine only ever reads them back. Feed entries are the pre-ingestion
//! view of a post, straight out of a parsed feed document.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tracked blog, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blog {
    pub id: i64,
    pub feed_url: String,
    pub site_url: String,
    pub title: String,
}

/// Insert payload for a blog. The id is assigned on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlog {
    pub feed_url: String,
    pub site_url: String,
    pub title: String,
}

/// A previously ingested post.
///
/// The sanitized body is write-only from the engine's point of view, so it
/// is not carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: i64,
    pub blog_id: i64,
    pub url: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a newly discovered post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub blog_id: i64,
    pub url: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    /// Sanitized text; empty when the body could not be fetched.
    pub body: String,
}

impl NewPost {
    pub fn from_entry(blog_id: i64, entry: FeedEntry, body: String) -> Self {
        Self {
            blog_id,
            url: entry.url,
            title: entry.title,
            updated_at: entry.updated_at,
            body,
        }
    }
}

/// One item of a freshly fetched feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub url: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Channel-level information read from a feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogMetadata {
    /// The site the feed links back to, when the feed declares one.
    pub site_url: Option<String>,
    pub title: String,
}
