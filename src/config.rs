//! TOML configuration for the `feedsync` binary and library.
//!
//! Only `[db]` is required. `[sync]` and `[http]` fall back to defaults
//! field by field, so a config file can override a single knob.
//!
//! ```toml
//! [db]
//! path = "./data/feedsync.sqlite"
//!
//! [sync]
//! interval_secs = 3600
//! blog_batch_size = 50
//! post_batch_size = 50
//! storage_timeout_secs = 5
//!
//! [http]
//! timeout_secs = 30
//! user_agent = "feedsync/0.1"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub blog_batch_size: i64,
    #[serde(default = "default_batch_size")]
    pub post_batch_size: i64,
    #[serde(default = "default_storage_timeout_secs")]
    pub storage_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            blog_batch_size: default_batch_size(),
            post_batch_size: default_batch_size(),
            storage_timeout_secs: default_storage_timeout_secs(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }
}

fn default_interval_secs() -> u64 {
    3600
}
fn default_batch_size() -> i64 {
    50
}
fn default_storage_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("feedsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// All-default configuration pointing at `db_path`.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            sync: SyncConfig::default(),
            http: HttpConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sync.interval_secs == 0 {
            anyhow::bail!("sync.interval_secs must be > 0");
        }
        if self.sync.blog_batch_size < 1 {
            anyhow::bail!("sync.blog_batch_size must be >= 1");
        }
        if self.sync.post_batch_size < 1 {
            anyhow::bail!("sync.post_batch_size must be >= 1");
        }
        if self.sync.storage_timeout_secs == 0 {
            anyhow::bail!("sync.storage_timeout_secs must be > 0");
        }
        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be > 0");
        }
        if self.http.user_agent.trim().is_empty() {
            anyhow::bail!("http.user_agent must not be empty");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
