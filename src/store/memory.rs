//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Uniqueness checks and inserts
//! happen under one write lock, so concurrent writers see the same
//! conflicts a database would report.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Blog, NewBlog, NewPost, Post};

use super::{Store, StoreStats};

struct StoredPost {
    id: i64,
    post: NewPost,
}

/// In-memory store. Ids start at 1 and increase by insertion order.
#[derive(Default)]
pub struct MemoryStore {
    blogs: RwLock<Vec<Blog>>,
    posts: RwLock<Vec<StoredPost>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored post payload for `blog_id`, in insertion order.
    pub fn posts_for(&self, blog_id: i64) -> Vec<NewPost> {
        let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
        posts
            .iter()
            .filter(|p| p.post.blog_id == blog_id)
            .map(|p| p.post.clone())
            .collect()
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_blogs(&self, limit: i64, offset: i64) -> Result<Vec<Blog>, StoreError> {
        let blogs = self.blogs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(page(blogs.iter().cloned(), limit, offset))
    }

    async fn list_posts_by_blog(
        &self,
        blog_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
        let matching = posts
            .iter()
            .filter(|p| p.post.blog_id == blog_id)
            .map(|p| Post {
                id: p.id,
                blog_id: p.post.blog_id,
                url: p.post.url.clone(),
                title: p.post.title.clone(),
                updated_at: p.post.updated_at,
            });
        Ok(page(matching, limit, offset))
    }

    async fn create_post(&self, post: &NewPost) -> Result<i64, StoreError> {
        let mut posts = self.posts.write().unwrap_or_else(PoisonError::into_inner);
        if posts
            .iter()
            .any(|p| p.post.blog_id == post.blog_id && p.post.url == post.url)
        {
            return Err(StoreError::Conflict(format!(
                "post {} for blog {}",
                post.url, post.blog_id
            )));
        }
        let id = posts.len() as i64 + 1;
        posts.push(StoredPost {
            id,
            post: post.clone(),
        });
        Ok(id)
    }

    async fn create_blog(&self, blog: &NewBlog) -> Result<Blog, StoreError> {
        let mut blogs = self.blogs.write().unwrap_or_else(PoisonError::into_inner);
        if blogs
            .iter()
            .any(|b| b.feed_url == blog.feed_url && b.site_url == blog.site_url)
        {
            return Err(StoreError::Conflict(format!("blog {}", blog.feed_url)));
        }
        let created = Blog {
            id: blogs.len() as i64 + 1,
            feed_url: blog.feed_url.clone(),
            site_url: blog.site_url.clone(),
            title: blog.title.clone(),
        };
        blogs.push(created.clone());
        Ok(created)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let blogs = self.blogs.read().unwrap_or_else(PoisonError::into_inner);
        let posts = self.posts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(StoreStats {
            blogs: blogs.len() as i64,
            posts: posts.len() as i64,
            empty_bodies: posts.iter().filter(|p| p.post.body.is_empty()).count() as i64,
            newest_post: posts.iter().map(|p| p.post.updated_at).max(),
        })
    }
}
