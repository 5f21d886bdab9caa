use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::domain::HtmlCache;

#[derive(Debug, Clone)]
pub struct Feed {
    pub title: String,
    pub description: String,
    /// A feed without a source URL is invalid and is never serialized.
    pub url: Option<Url>,
    pub last_modified: DateTime<FixedOffset>,
    pub entries: Vec<FeedEntry>,
}

impl Feed {
    pub fn is_valid(&self) -> bool {
        self.url.is_some()
    }

    /// Entries that can be written out.
    pub fn valid_entries(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter().filter(|e| e.is_valid())
    }
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Position of the index pattern that produced this entry.
    pub index_pattern: usize,
    pub title: String,
    pub link: Option<Url>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub content: String,
    /// Page record the entry was extracted from.
    pub cache: Arc<HtmlCache>,
}

impl FeedEntry {
    pub fn is_valid(&self) -> bool {
        self.link.is_some()
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            self.link.as_ref().map(Url::as_str).unwrap_or("(Untitled)")
        } else {
            &self.title
        }
    }
}
