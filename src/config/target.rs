use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::config::ConfigError;
use crate::domain::{FeedTarget, Pattern, SourceUrl};
use crate::pattern::{compile, PatternKind};

const HTTP_SCHEME: &str = "http://";
const HTTPS_SCHEME: &str = "https://";

/// One feed definition as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    #[serde(rename = "Feed.Title")]
    pub title: String,

    #[serde(rename = "Feed.Description")]
    pub description: String,

    #[serde(rename = "Feed.URL")]
    pub urls: Vec<String>,

    #[serde(rename = "Feed.IndexPattern")]
    pub index_patterns: Vec<String>,

    #[serde(rename = "Feed.ContentPattern")]
    pub content_patterns: Vec<String>,

    #[serde(rename = "Feed.IndexFilterPattern")]
    pub index_filter_patterns: Vec<String>,

    #[serde(rename = "Feed.ContentFilterPattern")]
    pub content_filter_patterns: Vec<String>,

    #[serde(rename = "Feed.PubDatePattern")]
    pub pub_date_patterns: Vec<String>,

    #[serde(rename = "Feed.Path")]
    pub feed_path: String,

    /// Pause between two requests of this target, in milliseconds.
    #[serde(rename = "Request.Interval")]
    pub request_interval_ms: u64,

    /// Run content patterns against the page each entry links to.
    #[serde(rename = "Feed.FetchContent")]
    pub fetch_content: bool,
}

/// Prepend `http://` to URLs written without a scheme.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(HTTP_SCHEME) || raw.starts_with(HTTPS_SCHEME) {
        raw.to_string()
    } else {
        format!("{HTTP_SCHEME}{raw}")
    }
}

impl TargetConfig {
    /// Name used in log lines and errors.
    pub fn name(&self) -> String {
        if !self.title.is_empty() {
            self.title.clone()
        } else {
            self.urls.first().cloned().unwrap_or_default()
        }
    }

    /// Validate the definition and compile its patterns.
    pub fn compile(&self) -> Result<FeedTarget, ConfigError> {
        let name = self.name();

        if self.urls.is_empty() {
            return Err(ConfigError::NoUrls { target: name });
        }
        if self.index_patterns.is_empty() {
            return Err(ConfigError::NoIndexPattern { target: name });
        }
        if self.feed_path.trim().is_empty() {
            return Err(ConfigError::MissingFeedPath { target: name });
        }

        let urls = self
            .urls
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                Url::parse(&normalize_url(raw))
                    .map(|url| SourceUrl { index, url })
                    .map_err(|source| ConfigError::InvalidUrl {
                        target: name.clone(),
                        url: raw.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let url_count = urls.len();
        let patterns = |field: &'static str, raws: &[String], kind: PatternKind| {
            compile_list(&name, field, raws, kind, url_count)
        };

        Ok(FeedTarget {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            index_patterns: patterns("Feed.IndexPattern", &self.index_patterns, PatternKind::Index)?,
            content_patterns: patterns(
                "Feed.ContentPattern",
                &self.content_patterns,
                PatternKind::Content,
            )?,
            index_filter_patterns: patterns(
                "Feed.IndexFilterPattern",
                &self.index_filter_patterns,
                PatternKind::Filter,
            )?,
            content_filter_patterns: patterns(
                "Feed.ContentFilterPattern",
                &self.content_filter_patterns,
                PatternKind::Filter,
            )?,
            pub_date_patterns: patterns(
                "Feed.PubDatePattern",
                &self.pub_date_patterns,
                PatternKind::PubDate,
            )?,
            urls,
            feed_path: PathBuf::from(self.feed_path.trim()),
            request_interval: Duration::from_millis(self.request_interval_ms),
            fetch_content: self.fetch_content,
        })
    }
}

fn compile_list(
    target: &str,
    field: &'static str,
    raws: &[String],
    kind: PatternKind,
    url_count: usize,
) -> Result<Vec<Pattern>, ConfigError> {
    if raws.len() > 1 && raws.len() != url_count {
        return Err(ConfigError::PatternCount {
            target: target.to_string(),
            field,
            got: raws.len(),
            urls: url_count,
        });
    }

    raws.iter()
        .enumerate()
        .map(|(position, raw)| {
            compile(raw, kind)
                .map(|regex| Pattern::new(position, regex))
                .map_err(|source| ConfigError::InvalidPattern {
                    target: target.to_string(),
                    field,
                    position,
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(urls: &[&str], index: &[&str]) -> TargetConfig {
        TargetConfig {
            title: "News".into(),
            urls: urls.iter().map(|s| s.to_string()).collect(),
            index_patterns: index.iter().map(|s| s.to_string()).collect(),
            feed_path: "news.xml".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com/a"), "http://example.com/a");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url(" http://x.org "), "http://x.org");
    }

    #[test]
    fn test_compile_assigns_positions() {
        let mut cfg = config(&["a.com", "b.com"], &["<i>{title}</i>", "<b>{title}</b>"]);
        cfg.pub_date_patterns = vec!["{year}-{month}".into()];
        cfg.request_interval_ms = 250;

        let target = cfg.compile().unwrap();
        assert_eq!(target.urls[1].index, 1);
        assert_eq!(target.urls[1].url.as_str(), "http://b.com/");
        assert_eq!(target.index_patterns[1].index, 1);
        assert_eq!(target.pub_date_patterns.len(), 1);
        assert!(target.content_patterns.is_empty());
        assert_eq!(target.request_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_pattern_count_must_match_urls() {
        let mut cfg = config(&["a.com", "b.com", "c.com"], &["{title}"]);
        cfg.content_patterns = vec!["{description}".into(), "{description}".into()];
        match cfg.compile() {
            Err(ConfigError::PatternCount { field, got, urls, .. }) => {
                assert_eq!(field, "Feed.ContentPattern");
                assert_eq!(got, 2);
                assert_eq!(urls, 3);
            }
            other => panic!("expected PatternCount, got {:?}", other),
        }
    }

    #[test]
    fn test_required_fields() {
        assert!(matches!(
            config(&[], &["{title}"]).compile(),
            Err(ConfigError::NoUrls { .. })
        ));
        assert!(matches!(
            config(&["a.com"], &[]).compile(),
            Err(ConfigError::NoIndexPattern { .. })
        ));
        let mut cfg = config(&["a.com"], &["{title}"]);
        cfg.feed_path = " ".into();
        assert!(matches!(
            cfg.compile(),
            Err(ConfigError::MissingFeedPath { .. })
        ));
    }

    #[test]
    fn test_bad_regex_is_config_error() {
        let cfg = config(&["a.com"], &["<a>({title}</a>"]);
        match cfg.compile() {
            Err(ConfigError::InvalidPattern { field, position, .. }) => {
                assert_eq!(field, "Feed.IndexPattern");
                assert_eq!(position, 0);
            }
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_name_falls_back_to_url() {
        let mut cfg = config(&["a.com"], &["{title}"]);
        cfg.title.clear();
        assert_eq!(cfg.name(), "a.com");
    }
}
