//! SQLite connection pool.
//!
//! The database file and its parent directory are created on first use.
//! Connections run in WAL mode with foreign keys enforced, and wait up to
//! the storage timeout for a lock held by an overlapping pass.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

const MAX_CONNECTIONS: u32 = 5;

fn connect_options(config: &Config) -> Result<SqliteConnectOptions> {
    let db_path = &config.db.path;
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .with_context(|| format!("Invalid database path: {}", db_path.display()))?;

    Ok(options
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.sync.storage_timeout())
        .journal_mode(SqliteJournalMode::Wal))
}

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    if let Some(parent) = config.db.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(connect_options(config)?)
        .await
        .with_context(|| format!("Failed to open database {}", config.db.path.display()))
}
