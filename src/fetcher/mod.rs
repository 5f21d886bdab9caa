pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::HtmlCache;

pub const NOT_MODIFIED: u16 = 304;

/// Response headers relevant to page caching.
#[derive(Debug, Clone, Default)]
pub struct CacheHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: CacheHeaders,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_not_modified(&self) -> bool {
        self.status == NOT_MODIFIED
    }
}

#[async_trait]
pub trait Fetcher {
    /// Fetch `url`, sending conditional headers derived from `prior`.
    ///
    /// A not-modified answer is a successful response with status 304; other
    /// non-success statuses are errors.
    async fn fetch(&self, url: &str, prior: Option<&HtmlCache>) -> Result<FetchResponse>;
}
