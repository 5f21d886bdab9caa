pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::HtmlCache;

pub use sqlite::SqliteStore;

/// Persistent page cache keyed by normalized URL.
pub trait CacheStore {
    /// Fails with `PagefeedError::NoCacheRecord` when nothing is stored yet.
    fn get(&self, url: &str) -> Result<HtmlCache>;
    fn put(&self, cache: &HtmlCache) -> Result<()>;
    /// Delete records requested before `cutoff`; returns how many went.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    fn count(&self) -> Result<usize>;
}
