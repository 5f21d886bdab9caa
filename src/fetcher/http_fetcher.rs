use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, DATE, ETAG, EXPIRES, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};

use crate::app::{PagefeedError, Result};
use crate::cache::freshness::format_http_date;
use crate::domain::HtmlCache;
use crate::fetcher::{CacheHeaders, FetchResponse, Fetcher, NOT_MODIFIED};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROJECT: &str = env!("CARGO_PKG_REPOSITORY");

pub fn user_agent() -> String {
    format!("Mozilla/5.0 (compatible; {NAME}/{VERSION}; +{PROJECT})")
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// `timeout` of `None` leaves requests unbounded at the client level.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

/// Conditional request headers for a previously cached page.
pub fn conditional_headers(prior: Option<&HtmlCache>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(prior) = prior else {
        return headers;
    };

    if !prior.etag.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&prior.etag) {
            headers.insert(IF_NONE_MATCH, value);
        }
    }

    if let Some(last_modified) = prior.last_modified {
        if let Ok(value) = HeaderValue::from_str(&format_http_date(&last_modified)) {
            headers.insert(IF_MODIFIED_SINCE, value);
        }
    }

    headers
}

fn header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, prior: Option<&HtmlCache>) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url)
            .headers(conditional_headers(prior))
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers();
        let cache_headers = CacheHeaders {
            etag: header(headers, ETAG),
            last_modified: header(headers, LAST_MODIFIED),
            cache_control: header(headers, CACHE_CONTROL),
            expires: header(headers, EXPIRES),
            date: header(headers, DATE),
        };

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse {
                status: NOT_MODIFIED,
                headers: cache_headers,
                body: Vec::new(),
            });
        }

        if !status.is_success() {
            return Err(PagefeedError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?.to_vec();

        Ok(FetchResponse {
            status: status.as_u16(),
            headers: cache_headers,
            body,
        })
    }
}
