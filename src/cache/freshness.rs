//! Decides whether a cached page may be reused and how a new response
//! changes the stored record.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::app::{PagefeedError, Result};
use crate::domain::{CacheStatus, HtmlCache};
use crate::fetcher::FetchResponse;

/// Parse an HTTP-date in any of the three forms RFC 9110 allows:
/// `Sun, 06 Nov 1994 08:49:37 GMT`, `Sunday, 06-Nov-94 08:49:37 GMT` or
/// `Sun Nov  6 08:49:37 1994`.
pub fn parse_http_date(s: &str) -> Result<DateTime<Utc>> {
    httpdate::parse_http_date(s.trim())
        .map(DateTime::<Utc>::from)
        .map_err(|_| PagefeedError::HttpDate(s.to_string()))
}

pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    httpdate::fmt_http_date(SystemTime::from(*dt))
}

/// `max-age` from a Cache-Control value; zero when missing or malformed.
pub fn extract_max_age(cache_control: &str) -> Duration {
    let Some(directive) = cache_control
        .split(',')
        .map(str::trim)
        .find(|d| d.starts_with("max-age"))
    else {
        return Duration::ZERO;
    };

    let parts: Vec<&str> = directive.split('=').collect();
    if parts.len() != 2 {
        tracing::warn!("Failed to parse max-age directive {:?}", directive);
        return Duration::ZERO;
    }

    match parts[1].trim().trim_matches('"').parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => {
            tracing::warn!("Invalid max-age value {:?}: {}", parts[1], e);
            Duration::ZERO
        }
    }
}

/// Expiry granted by a response: the later of `Expires` and `Date + max-age`.
///
/// `date` is the response `Date` header; `requested_at` stands in for it when
/// the header is absent. An unparsable `Date` or `Expires` is an error.
pub fn effective_expiry(
    date: Option<&str>,
    requested_at: DateTime<Utc>,
    cache_control: &str,
    expires: Option<&str>,
) -> Result<Option<DateTime<Utc>>> {
    let base = date.map(parse_http_date).transpose()?.unwrap_or(requested_at);
    let max_age = extract_max_age(cache_control);
    let from_max_age = (!max_age.is_zero())
        .then(|| chrono::Duration::from_std(max_age).ok())
        .flatten()
        .and_then(|age| base.checked_add_signed(age));
    let from_header = expires.map(parse_http_date).transpose()?;

    Ok(match (from_max_age, from_header) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    })
}

/// A record can be reused without any request while it is unexpired and
/// unchanged.
pub fn is_fresh(record: &HtmlCache, now: DateTime<Utc>) -> bool {
    record.status == CacheStatus::NotModified && record.expires.is_some_and(|exp| now < exp)
}

fn validators_match(prior: &HtmlCache, response: &FetchResponse) -> bool {
    if let Some(etag) = response.headers.etag.as_deref() {
        if !etag.is_empty() && !prior.etag.is_empty() {
            return etag == prior.etag;
        }
    }
    let last_modified = response
        .headers
        .last_modified
        .as_deref()
        .and_then(|s| parse_http_date(s).ok());
    if let (Some(new), Some(old)) = (last_modified, prior.last_modified) {
        return new == old;
    }
    !prior.html.is_empty() && response.body == prior.html
}

/// Build the record that replaces `prior` after `response` was received.
pub fn evaluate(
    url: &str,
    prior: Option<&HtmlCache>,
    response: &FetchResponse,
    requested_at: DateTime<Utc>,
) -> HtmlCache {
    let headers = &response.headers;
    let date = headers
        .date
        .as_deref()
        .and_then(|s| parse_http_date(s).ok())
        .unwrap_or(requested_at);

    let mut record = HtmlCache::new(url, date);

    match prior {
        None => {
            record.status = CacheStatus::New;
            record.html = response.body.clone();
        }
        Some(prior) if response.is_not_modified() || validators_match(prior, response) => {
            record.status = CacheStatus::NotModified;
            record.html = prior.html.clone();
            record.etag = prior.etag.clone();
            record.last_modified = prior.last_modified;
            record.cache_control = prior.cache_control.clone();
        }
        Some(_) => {
            record.status = CacheStatus::Modified;
            record.html = response.body.clone();
        }
    }

    if let Some(etag) = headers.etag.as_deref() {
        record.etag = etag.to_string();
    }
    if let Some(last_modified) = headers.last_modified.as_deref() {
        match parse_http_date(last_modified) {
            Ok(dt) => record.last_modified = Some(dt),
            Err(e) => tracing::debug!("Ignoring Last-Modified of {}: {}", url, e),
        }
    }
    if let Some(cache_control) = headers.cache_control.as_deref() {
        record.cache_control = cache_control.to_string();
    }

    record.expires = match effective_expiry(
        headers.date.as_deref(),
        requested_at,
        &record.cache_control,
        headers.expires.as_deref(),
    ) {
        Ok(expires) => expires,
        Err(e) => {
            tracing::warn!("Cannot compute expiry for {}: {}", url, e);
            None
        }
    };

    record
}
