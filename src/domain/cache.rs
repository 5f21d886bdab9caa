use chrono::{DateTime, Utc};

/// How a page changed between the stored record and the latest response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheStatus {
    #[default]
    NotModified,
    New,
    Modified,
}

impl CacheStatus {
    pub fn is_changed(self) -> bool {
        !matches!(self, CacheStatus::NotModified)
    }
}

/// One cached HTML page together with the HTTP metadata that governs reuse.
#[derive(Debug, Clone)]
pub struct HtmlCache {
    pub status: CacheStatus,
    pub url: String,
    /// Date of the request that produced this body; `None` when unknown.
    pub date: Option<DateTime<Utc>>,
    pub cache_control: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: String,
    /// Effective expiry, computed from `Expires` and `max-age`.
    pub expires: Option<DateTime<Utc>>,
    pub html: Vec<u8>,
}

impl HtmlCache {
    pub fn new(url: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            status: CacheStatus::New,
            url: url.into(),
            date: Some(date),
            cache_control: String::new(),
            last_modified: None,
            etag: String::new(),
            expires: None,
            html: Vec::new(),
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn html_text(&self) -> String {
        String::from_utf8_lossy(&self.html).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_new() {
        let cache = HtmlCache::new("http://example.com/", Utc::now());
        assert_eq!(cache.status, CacheStatus::New);
        assert!(cache.html.is_empty());
        assert!(cache.expires.is_none());
    }

    #[test]
    fn test_default_status_is_not_modified() {
        assert_eq!(CacheStatus::default(), CacheStatus::NotModified);
        assert!(!CacheStatus::NotModified.is_changed());
        assert!(CacheStatus::New.is_changed());
        assert!(CacheStatus::Modified.is_changed());
    }

    #[test]
    fn test_html_text_is_lossy() {
        let mut cache = HtmlCache::new("http://example.com/", Utc::now());
        cache.html = vec![b'<', b'p', b'>', 0xff, b'<'];
        assert_eq!(cache.html_text(), "<p>\u{fffd}<");
    }
}
