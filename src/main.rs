//! # feedsync CLI
//!
//! The `feedsync` binary wires the sync engine to SQLite and HTTP.
//!
//! ## Usage
//!
//! ```bash
//! feedsync --config ./config/feedsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `feedsync init` | Create the SQLite database and run schema migrations |
//! | `feedsync blog add <feed_url>` | Start tracking a blog |
//! | `feedsync blogs` | List tracked blogs |
//! | `feedsync sync` | Run one sync pass |
//! | `feedsync run` | Sync on a fixed interval until interrupted |
//! | `feedsync stats` | Show database statistics |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use feedsync::config::{self, Config};
use feedsync::feed::HttpFeedReader;
use feedsync::provision::{self, AddBlogOutcome};
use feedsync::sanitize::HtmlCleaner;
use feedsync::store::{SqliteStore, Store};
use feedsync::sync::{SyncReport, SyncSettings, Syncer};
use feedsync::{db, migrate, stats};

/// feedsync: keeps a blog aggregator's posts in step with their feeds.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/feedsync.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "feedsync", version, about = "Periodic RSS/Atom ingestion for a blog aggregator")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/feedsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage tracked blogs.
    Blog {
        #[command(subcommand)]
        action: BlogAction,
    },

    /// List tracked blogs.
    Blogs,

    /// Run a single sync pass and print what it did.
    Sync {
        /// Print the pass report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sync immediately, then on every interval until Ctrl-C.
    Run {
        /// Seconds between passes. Overrides `[sync].interval_secs`.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum BlogAction {
    /// Track a new blog by its feed URL.
    ///
    /// The feed is fetched once to read the blog's title and site link.
    Add {
        feed_url: String,

        /// Site URL to record instead of the one the feed links to.
        #[arg(long)]
        site_url: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn open_store(cfg: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn http_reader(cfg: &Config) -> Result<Arc<HttpFeedReader>> {
    let cleaner = Arc::new(HtmlCleaner::new());
    Ok(Arc::new(HttpFeedReader::new(&cfg.http, cleaner)?))
}

async fn open_syncer(cfg: &Config) -> Result<Syncer<SqliteStore, HttpFeedReader>> {
    let store = open_store(cfg).await?;
    let reader = http_reader(cfg)?;
    Ok(Syncer::new(store, reader, SyncSettings::from(&cfg.sync)))
}

async fn list_blogs(cfg: &Config) -> Result<()> {
    let store = open_store(cfg).await?;
    let limit = cfg.sync.blog_batch_size;
    let mut offset = 0;
    let mut blogs = Vec::new();
    loop {
        let page = store
            .list_blogs(limit, offset)
            .await
            .context("Failed to list blogs")?;
        if page.is_empty() {
            break;
        }
        blogs.extend(page);
        offset += limit;
    }

    if blogs.is_empty() {
        println!("No blogs tracked. Add one with `feedsync blog add <feed_url>`.");
        return Ok(());
    }

    println!("{:>6}  {:<32}  {}", "ID", "TITLE", "FEED");
    println!("{}", "-".repeat(80));
    for blog in &blogs {
        let title: String = blog.title.chars().take(32).collect();
        println!("{:>6}  {:<32}  {}", blog.id, title, blog.feed_url);
    }
    println!();
    println!("{} blog(s)", blogs.len());
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("Sync complete in {} ms", report.elapsed_ms);
    println!("  blogs:            {} ({} failed)", report.blogs, report.blogs_failed);
    println!("  entries seen:     {}", report.posts_discovered);
    println!("  new posts:        {}", report.posts_new);
    println!("  created:          {}", report.created);
    println!("  already present:  {}", report.conflicts);
    println!("  store failures:   {}", report.persist_failures);
    println!("  missing bodies:   {}", report.body_failures);
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Blog {
            action: BlogAction::Add { feed_url, site_url },
        } => {
            let store = open_store(&cfg).await?;
            let reader = http_reader(&cfg)?;
            match provision::add_blog(&*store, &*reader, &feed_url, site_url.as_deref()).await? {
                AddBlogOutcome::Created(blog) => {
                    println!("Added blog {} \"{}\" ({})", blog.id, blog.title, blog.site_url);
                }
                AddBlogOutcome::AlreadyExists => {
                    println!("Blog already tracked: {}", feed_url);
                }
            }
        }
        Commands::Blogs => {
            list_blogs(&cfg).await?;
        }
        Commands::Sync { json } => {
            let syncer = open_syncer(&cfg).await?;
            let report = syncer.run_once().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Run { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.sync.interval());
            anyhow::ensure!(!interval.is_zero(), "--interval must be greater than zero");

            let syncer = open_syncer(&cfg).await?;
            tracing::info!(interval_secs = interval.as_secs(), "starting sync loop");
            tokio::select! {
                _ = syncer.run_forever(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted, stopping");
                }
            }
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
