//! # feedsync
//!
//! Periodic RSS/Atom ingestion for a blog aggregator.
//!
//! feedsync keeps a store of blog posts in step with the feeds of every
//! tracked blog. Each pass reads each feed, works out which entries are not
//! yet stored, fetches and sanitizes their pages to plain text, and stores
//! them. Passes are safe to overlap: the store's uniqueness constraint
//! settles races.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ FeedReader  │──▶│   Syncer    │──▶│  Store   │
//! │ HTTP + XML  │   │ delta+fetch │   │ SQLite   │
//! └─────────────┘   └─────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! feedsync init
//! feedsync blog add https://example.com/feed.xml
//! feedsync sync
//! feedsync run --interval 3600
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`error`] | Typed feed, storage, and sync errors |
//! | [`feed`] | `FeedReader` trait and HTTP implementation |
//! | [`feed_parser`] | RSS 2.0, RSS 1.0 and Atom parsing |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Core data types |
//! | [`provision`] | Adding blogs from their feed |
//! | [`sanitize`] | HTML to plain text |
//! | [`stats`] | Database overview |
//! | [`store`] | `Store` trait, SQLite and in-memory backends |
//! | [`sync`] | The sync engine |

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod feed_parser;
pub mod migrate;
pub mod models;
pub mod provision;
pub mod sanitize;
pub mod stats;
pub mod store;
pub mod sync;
