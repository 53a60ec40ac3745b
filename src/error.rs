//! Typed errors for feed access, storage, and the sync engine.
//!
//! Library code returns these so callers can tell a duplicate post apart
//! from a broken database; the binary wraps them in `anyhow` at the edges.

use std::time::Duration;

use thiserror::Error;

/// Failure reading a remote feed or post.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-layer failure, or a URL that cannot be requested at all.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server answered with a non-success status.
    #[error("fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The document is not a well-formed RSS or Atom feed.
    #[error("failed to parse feed {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FeedError {
    pub fn fetch(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        FeedError::Fetch {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        FeedError::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True for network and HTTP status failures.
    pub fn is_fetch(&self) -> bool {
        matches!(self, FeedError::Fetch { .. } | FeedError::Status { .. })
    }
}

/// Failure talking to the storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same identity already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Failure that ends a whole sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list tracked blogs at offset {offset}: {source}")]
    ListBlogs {
        offset: i64,
        #[source]
        source: StoreError,
    },
}

/// Failure that ends the sync of a single blog. Logged, never escalated.
#[derive(Debug, Error)]
pub enum BlogSyncError {
    #[error("failed to read known posts: {0}")]
    KnownPosts(#[source] StoreError),

    #[error("failed to read feed: {0}")]
    Feed(#[source] FeedError),
}
