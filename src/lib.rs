//! # Pagefeed
//!
//! Generates RSS 2.0 feeds from plain HTML pages, driven by regex patterns
//! with named placeholders.
//!
//! ## Architecture
//!
//! ```text
//! Config → Fetcher ⇄ Cache → Extractor → Serializer
//! ```
//!
//! Each target lists source URLs and patterns. Pages are fetched through an
//! HTTP-aware cache, index patterns cut them into entries, content patterns
//! pick each entry's body, and the result is written as an RSS file.
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate ~/.config/pagefeed/config.json
//! pagefeed check
//!
//! # Generate every feed
//! pagefeed run
//!
//! # Drop cached pages older than CacheLifetime
//! pagefeed purge
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cache`]: Freshness rules and per-URL locks
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Configuration file and target validation
//! - [`domain`]: Core domain models (FeedTarget, HtmlCache, Feed)
//! - [`extractor`]: HTML-to-entry pipeline
//! - [`fetcher`]: HTTP fetching with conditional requests
//! - [`normalizer`]: Pub-date normalization
//! - [`pattern`]: Placeholder compilation and pattern resolution
//! - [`serializer`]: RSS output
//! - [`store`]: Page cache persistence

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, fetcher, pipeline.
pub mod app;

/// HTTP cache semantics.
///
/// - [`evaluate`](cache::evaluate): classify a response as new, modified or not modified
/// - [`is_fresh`](cache::is_fresh): whether a stored page can be reused without a request
/// - [`UrlLocks`](cache::UrlLocks): one async lock per URL
pub mod cache;

/// Command-line interface using clap.
///
/// - `run` - Generate every feed
/// - `check` - Validate the configuration
/// - `purge` - Apply the cache lifetime
pub mod cli;

/// Configuration loading.
///
/// Reads `~/.config/pagefeed/config.json` (or a `.toml` file with the same
/// keys) and compiles targets into [`FeedTarget`](domain::FeedTarget)s.
pub mod config;

/// Core domain models.
pub mod domain;

/// Extraction of feed entries from cached pages.
pub mod extractor;

/// HTTP fetching with conditional request support.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for page fetching
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::parallel::ParallelFetcher): Bounded pool with deadlines
pub mod fetcher;

/// Turns captured date fragments into timestamps.
pub mod normalizer;

/// Placeholder patterns such as `{title}` and which of them applies where.
pub mod pattern;

/// RSS 2.0 writer.
pub mod serializer;

/// SQLite persistence layer.
///
/// - [`CacheStore`](store::CacheStore): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
