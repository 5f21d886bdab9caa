use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Captures;
use url::Url;

use crate::domain::{FeedEntry, FeedTarget, HtmlCache, Pattern};
use crate::extractor::sanitize::Sanitizer;
use crate::normalizer::DateNormalizer;
use crate::pattern::compiler::{DESCRIPTION, LINK, PUBDATE, TITLE};
use crate::pattern::{resolver, Resolved};

/// An index match whose content has not been extracted yet.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub index_pattern: &'a Pattern,
    pub title: String,
    pub link: Option<Url>,
    /// Full text matched by the index pattern.
    pub span: String,
    pub description: Option<String>,
    pub pub_date: Option<String>,
}

/// Resolve a captured href against the page it was found on.
pub fn resolve_link(base: Option<&Url>, raw: &str) -> Option<Url> {
    let raw = html_escape::decode_html_entities(raw.trim()).into_owned();
    if raw.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(&raw).ok(),
        None => Url::parse(&raw).ok(),
    }
}

fn capture(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}

fn warn_unmatched(target: &FeedTarget, kind: &str, resolved: &Resolved<'_>) {
    if let Resolved::Unmatched { position } = resolved {
        tracing::warn!(
            "{}: no {} pattern at position {}",
            target.display_title(),
            kind,
            position
        );
    }
}

#[derive(Debug, Clone)]
pub struct EntryExtractor {
    sanitizer: Sanitizer,
    normalizer: DateNormalizer,
}

impl EntryExtractor {
    pub fn new(sanitizer: Sanitizer, normalizer: DateNormalizer) -> Self {
        Self {
            sanitizer,
            normalizer,
        }
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn timezone(&self) -> FixedOffset {
        self.normalizer.timezone()
    }

    /// Apply the index pattern of `url_index` to `page`, dropping matches
    /// rejected by the index filter.
    pub fn candidates<'a>(
        &self,
        target: &'a FeedTarget,
        url_index: usize,
        page: &HtmlCache,
    ) -> Vec<Candidate<'a>> {
        let resolved = resolver::index_pattern(target, url_index);
        warn_unmatched(target, "index", &resolved);
        let Some(index_pattern) = resolved.pattern() else {
            return Vec::new();
        };

        let filter = resolver::index_filter_pattern(target, index_pattern);
        warn_unmatched(target, "index filter", &filter);
        let filter = filter.pattern();

        let html = page.html_text();
        let base = Url::parse(&page.url).ok();

        let mut candidates = Vec::new();
        for caps in index_pattern.regex.captures_iter(&html) {
            let Some(span) = caps.get(0).map(|m| m.as_str()) else {
                continue;
            };
            if let Some(filter) = filter {
                if filter.regex.is_match(span) {
                    tracing::debug!("Index filter dropped a match on {}", page.url);
                    continue;
                }
            }

            candidates.push(Candidate {
                index_pattern,
                title: capture(&caps, TITLE)
                    .map(|t| html_escape::decode_html_entities(t.trim()).into_owned())
                    .unwrap_or_default(),
                link: caps
                    .name(LINK)
                    .and_then(|m| resolve_link(base.as_ref(), m.as_str())),
                span: span.to_string(),
                description: capture(&caps, DESCRIPTION),
                pub_date: capture(&caps, PUBDATE),
            });
        }

        tracing::debug!("{} index matches on {}", candidates.len(), page.url);
        candidates
    }

    /// Run the content stage on `source` and build the entry. `cache` is the
    /// record `source` came from. Returns `None` when a filter rejects the
    /// entry or its pub-date cannot be parsed.
    pub fn finish(
        &self,
        target: &FeedTarget,
        url_index: usize,
        candidate: Candidate<'_>,
        source: &str,
        cache: Arc<HtmlCache>,
        now: DateTime<Utc>,
    ) -> Option<FeedEntry> {
        let Candidate {
            index_pattern,
            title,
            link,
            span: _,
            description,
            pub_date,
        } = candidate;
        let mut content = description;
        let mut raw_date = pub_date;

        let resolved = resolver::content_pattern(target, url_index, index_pattern);
        warn_unmatched(target, "content", &resolved);
        if let Some(content_pattern) = resolved.pattern() {
            match content_pattern.regex.captures(source) {
                Some(caps) => {
                    let matched = caps.get(0).map(|m| m.as_str()).unwrap_or_default();

                    let filter = resolver::content_filter_pattern(target, content_pattern);
                    warn_unmatched(target, "content filter", &filter);
                    if let Some(filter) = filter.pattern() {
                        if filter.regex.is_match(matched) {
                            tracing::debug!("Content filter dropped {:?}", title);
                            return None;
                        }
                    }

                    content = Some(
                        capture(&caps, DESCRIPTION).unwrap_or_else(|| matched.to_string()),
                    );
                    if let Some(date) = capture(&caps, PUBDATE) {
                        raw_date = Some(date);
                    }
                }
                None => tracing::debug!("Content pattern did not match for {:?}", title),
            }
        }

        let pub_date = match raw_date {
            Some(raw) => {
                let resolved = resolver::pub_date_pattern(target, url_index);
                warn_unmatched(target, "pub-date", &resolved);
                match resolved.pattern() {
                    Some(pattern) => {
                        match self.normalizer.normalize_at(Some(&pattern.regex), &raw, now) {
                            Ok(date) => Some(date),
                            Err(e) => {
                                tracing::warn!("Dropping entry {:?}: {}", title, e);
                                return None;
                            }
                        }
                    }
                    None => None,
                }
            }
            None => None,
        };

        Some(FeedEntry {
            index_pattern: index_pattern.index,
            title,
            link,
            pub_date,
            content: self.sanitizer.clean(&content.unwrap_or_default()),
            cache,
        })
    }

    /// Entries of one page whose content patterns apply to the index match
    /// itself.
    pub fn extract(
        &self,
        target: &FeedTarget,
        url_index: usize,
        page: Arc<HtmlCache>,
        now: DateTime<Utc>,
    ) -> Vec<FeedEntry> {
        self.candidates(target, url_index, &page)
            .into_iter()
            .filter_map(|candidate| {
                let span = candidate.span.clone();
                self.finish(target, url_index, candidate, &span, page.clone(), now)
            })
            .collect()
    }
}
