use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use url::Url;

/// A compiled pattern together with its position in the configured list.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub index: usize,
    pub regex: Regex,
}

impl Pattern {
    pub fn new(index: usize, regex: Regex) -> Self {
        Self { index, regex }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct SourceUrl {
    pub index: usize,
    pub url: Url,
}

/// A validated feed definition.
///
/// Every pattern list has length 0 (not configured), 1 (applies to every
/// URL or index pattern) or `urls.len()` (positional).
#[derive(Debug, Clone)]
pub struct FeedTarget {
    pub title: String,
    pub description: String,
    pub urls: Vec<SourceUrl>,
    pub index_patterns: Vec<Pattern>,
    pub content_patterns: Vec<Pattern>,
    pub index_filter_patterns: Vec<Pattern>,
    pub content_filter_patterns: Vec<Pattern>,
    pub pub_date_patterns: Vec<Pattern>,
    pub feed_path: PathBuf,
    pub request_interval: Duration,
    /// Apply content patterns to the page behind each entry link.
    pub fetch_content: bool,
}

impl FeedTarget {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            self.urls.first().map(|u| u.url.as_str()).unwrap_or("(untitled)")
        } else {
            &self.title
        }
    }
}
