use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::normalizer::PubDateError;

#[derive(Error, Debug)]
pub enum PagefeedError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store holds no record for this URL yet.
    #[error("No cached page for {0}")]
    NoCacheRecord(String),

    #[error("Request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid HTTP date: {0}")]
    HttpDate(String),

    #[error("Pub-date error: {0}")]
    PubDate(#[from] PubDateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("RSS writing error: {0}")]
    Xml(String),

    #[error("Feed has no source URL: {0}")]
    InvalidFeed(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PagefeedError>;
