use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;

use axum::http::header;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;

fn feedsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("feedsync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/feedsync.sqlite"

[sync]
interval_secs = 60
blog_batch_size = 10
post_batch_size = 10

[http]
timeout_secs = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("feedsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_feedsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = feedsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run feedsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Serve a two-post feed from 127.0.0.1 on a runtime of its own, so the
/// blocking CLI calls below can talk to it.
fn spawn_feed_server() -> (SocketAddr, tokio::runtime::Runtime) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let listener = rt
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let feed = format!(
        r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Test Blog</title>
  <link href="http://{addr}/"/>
  <entry>
    <title>One</title>
    <link href="http://{addr}/posts/1"/>
    <updated>2024-02-01T09:00:00Z</updated>
  </entry>
  <entry>
    <title>Two</title>
    <link href="http://{addr}/posts/2"/>
    <updated>2024-02-02T09:00:00Z</updated>
  </entry>
</feed>"#
    );

    let app = Router::new()
        .route(
            "/atom.xml",
            get(move || {
                let body = feed.clone();
                async move { ([(header::CONTENT_TYPE, "application/atom+xml")], body) }
            }),
        )
        .route(
            "/posts/1",
            get(|| async { Html("<html><body><p>Post one</p></body></html>") }),
        );
    rt.spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, rt)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_feedsync(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/feedsync.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_feedsync(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_feedsync(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_blogs_empty() {
    let (_tmp, config_path) = setup_test_env();

    run_feedsync(&config_path, &["init"]);
    let (stdout, stderr, success) = run_feedsync(&config_path, &["blogs"]);
    assert!(success, "blogs failed: stderr={}", stderr);
    assert!(stdout.contains("No blogs tracked"));
}

#[test]
fn test_sync_with_no_blogs() {
    let (_tmp, config_path) = setup_test_env();

    run_feedsync(&config_path, &["init"]);
    let (stdout, stderr, success) = run_feedsync(&config_path, &["sync", "--json"]);
    assert!(success, "sync failed: stderr={}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["blogs"], 0);
    assert_eq!(report["created"], 0);
}

#[test]
fn test_stats_after_init() {
    let (_tmp, config_path) = setup_test_env();

    run_feedsync(&config_path, &["init"]);
    let (stdout, stderr, success) = run_feedsync(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("Blogs:        0"));
    assert!(stdout.contains("Newest post:  never"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_feedsync(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("config"), "stderr={}", stderr);
}

#[test]
fn test_add_blog_then_sync() {
    let (_tmp, config_path) = setup_test_env();
    let (addr, _rt) = spawn_feed_server();
    let feed_url = format!("http://{addr}/atom.xml");

    run_feedsync(&config_path, &["init"]);

    let (stdout, stderr, success) = run_feedsync(&config_path, &["blog", "add", &feed_url]);
    assert!(success, "blog add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Test Blog"));

    let (stdout, _, success) = run_feedsync(&config_path, &["blog", "add", &feed_url]);
    assert!(success);
    assert!(stdout.contains("already tracked"));

    let (stdout, _, _) = run_feedsync(&config_path, &["blogs"]);
    assert!(stdout.contains(&feed_url));
    assert!(stdout.contains("1 blog(s)"));

    // /posts/2 is a 404: stored anyway, with an empty body
    let (stdout, stderr, success) = run_feedsync(&config_path, &["sync", "--json"]);
    assert!(success, "sync failed: stderr={}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["created"], 2);
    assert_eq!(report["body_failures"], 1);

    let (stdout, _, _) = run_feedsync(&config_path, &["sync", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["posts_new"], 0);

    let (stdout, _, _) = run_feedsync(&config_path, &["stats"]);
    assert!(stdout.contains("Posts:        2"));
    assert!(stdout.contains("Empty bodies: 1 / 2"));
}
