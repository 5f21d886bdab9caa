use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{PagefeedError, Result};
use crate::config::Config;
use crate::extractor::{EntryExtractor, Pipeline, Sanitizer};
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::parallel::ParallelFetcher;
use crate::fetcher::Fetcher;
use crate::normalizer::DateNormalizer;
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub pipeline: Pipeline,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.cache_db.trim() {
            "" => Self::default_db_path()?,
            path => {
                let path = PathBuf::from(path);
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                path
            }
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(config.http_timeout())?);
        Self::with_parts(config, store, fetcher)
    }

    /// Build a context on an existing store and transport.
    pub fn with_parts(
        config: Config,
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Result<Self> {
        let parallel_fetcher =
            ParallelFetcher::with_workers(fetcher, config.workers, config.http_timeout());
        let extractor = EntryExtractor::new(
            Sanitizer::new()?,
            DateNormalizer::new(config.timezone()?),
        );
        let pipeline = Pipeline::new(store.clone(), parallel_fetcher, extractor);

        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    pub fn in_memory(config: Config, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Result<Self> {
        Self::with_parts(config, Arc::new(SqliteStore::in_memory()?), fetcher)
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| PagefeedError::Other("Could not find data directory".into()))?;
        let pagefeed_dir = data_dir.join("pagefeed");
        std::fs::create_dir_all(&pagefeed_dir)?;
        Ok(pagefeed_dir.join("cache.db"))
    }
}
