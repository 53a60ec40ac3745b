use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use feedsync::config::Config;
use feedsync::error::FeedError;
use feedsync::feed::FeedReader;
use feedsync::models::{Blog, BlogMetadata, FeedEntry, NewBlog, NewPost};
use feedsync::store::{SqliteStore, Store};
use feedsync::sync::{SyncSettings, Syncer};
use feedsync::{db, migrate};

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let config = Config::minimal(tmp.path().join("data").join("feedsync.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn new_blog(n: usize) -> NewBlog {
    NewBlog {
        feed_url: format!("https://blog{n}.example/feed.xml"),
        site_url: format!("https://blog{n}.example/"),
        title: format!("Blog {n}"),
    }
}

fn new_post(blog_id: i64, url: &str, body: &str) -> NewPost {
    NewPost {
        blog_id,
        url: url.to_string(),
        title: format!("Title of {url}"),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    migrate::apply(store.pool()).await.unwrap();
    assert!(store.list_blogs(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blogs_page_in_id_order() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    for n in 0..5 {
        store.create_blog(&new_blog(n)).await.unwrap();
    }

    let first = store.list_blogs(2, 0).await.unwrap();
    let last = store.list_blogs(2, 4).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].title, "Blog 0");
    assert!(first[0].id < first[1].id);
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].title, "Blog 4");
    assert!(store.list_blogs(2, 6).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_blog_is_conflict() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    store.create_blog(&new_blog(1)).await.unwrap();
    let err = store.create_blog(&new_blog(1)).await.unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_posts_round_trip_and_conflict() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let blog = store.create_blog(&new_blog(1)).await.unwrap();
    let other = store.create_blog(&new_blog(2)).await.unwrap();

    let id = store
        .create_post(&new_post(blog.id, "https://blog1.example/a", "hello"))
        .await
        .unwrap();
    assert!(id > 0);

    let err = store
        .create_post(&new_post(blog.id, "https://blog1.example/a", "again"))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");

    // Uniqueness is per blog
    store
        .create_post(&new_post(other.id, "https://blog1.example/a", ""))
        .await
        .unwrap();

    let posts = store.list_posts_by_blog(blog.id, 50, 0).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, id);
    assert_eq!(posts[0].url, "https://blog1.example/a");
    assert_eq!(
        posts[0].updated_at,
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_post_for_unknown_blog_is_not_a_conflict() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let err = store
        .create_post(&new_post(999, "https://nowhere/a", ""))
        .await
        .unwrap_err();
    assert!(!err.is_conflict());
}

#[tokio::test]
async fn test_stats() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let empty = store.stats().await.unwrap();
    assert_eq!(empty.posts, 0);
    assert_eq!(empty.newest_post, None);

    let blog = store.create_blog(&new_blog(1)).await.unwrap();
    store.create_post(&new_post(blog.id, "https://x/1", "")).await.unwrap();
    store.create_post(&new_post(blog.id, "https://x/2", "text")).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.blogs, 1);
    assert_eq!(stats.posts, 2);
    assert_eq!(stats.empty_bodies, 1);
    assert_eq!(
        stats.newest_post,
        Some(Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap())
    );
}

struct StaticFeed(Vec<FeedEntry>);

#[async_trait]
impl FeedReader for StaticFeed {
    async fn fetch_blog_metadata(&self, _: &str) -> Result<BlogMetadata, FeedError> {
        Ok(BlogMetadata {
            site_url: None,
            title: String::new(),
        })
    }

    async fn list_entries(&self, _: &Blog) -> Result<Vec<FeedEntry>, FeedError> {
        Ok(self.0.clone())
    }

    async fn fetch_post_body(&self, url: &str) -> Result<String, FeedError> {
        Ok(format!("text of {url}"))
    }
}

#[tokio::test]
async fn test_sync_into_sqlite_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(open_store(&tmp).await);
    let blog = store.create_blog(&new_blog(1)).await.unwrap();

    let entries = (0..60)
        .map(|i| FeedEntry {
            url: format!("https://blog1.example/p/{i}"),
            title: format!("Post {i}"),
            updated_at: Utc::now(),
        })
        .collect();
    let syncer = Syncer::new(
        store.clone(),
        Arc::new(StaticFeed(entries)),
        SyncSettings::default(),
    );

    let first = syncer.run_once().await.unwrap();
    assert_eq!(first.created, 60);

    // 60 known posts span two pages; nothing is new the second time
    let second = syncer.run_once().await.unwrap();
    assert_eq!(second.posts_new, 0);
    assert_eq!(second.conflicts, 0);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.posts, 60);
    assert_eq!(stats.empty_bodies, 0);
    assert!(store
        .list_posts_by_blog(blog.id, 50, 50)
        .await
        .unwrap()
        .len()
        == 10);
}
