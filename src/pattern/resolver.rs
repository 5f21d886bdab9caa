//! Decides which configured pattern applies to a URL or an index pattern.
//!
//! A single configured pattern always wins. Otherwise lists are positional:
//! index and pub-date patterns follow the URL list, content and filter
//! patterns follow the list they refine.

use crate::domain::{FeedTarget, Pattern};

#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Found(&'a Pattern),
    /// Nothing configured for this category.
    NotConfigured,
    /// Patterns are configured but none sits at the requested position.
    Unmatched { position: usize },
}

impl<'a> Resolved<'a> {
    pub fn pattern(self) -> Option<&'a Pattern> {
        match self {
            Resolved::Found(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, Resolved::Unmatched { .. })
    }
}

fn at(patterns: &[Pattern], position: usize) -> Resolved<'_> {
    patterns
        .iter()
        .find(|p| p.index == position)
        .map(Resolved::Found)
        .unwrap_or(Resolved::Unmatched { position })
}

fn single_or_at(patterns: &[Pattern], position: usize) -> Resolved<'_> {
    match patterns {
        [] => Resolved::NotConfigured,
        [only] => Resolved::Found(only),
        _ => at(patterns, position),
    }
}

pub fn index_pattern(target: &FeedTarget, url_index: usize) -> Resolved<'_> {
    let patterns = &target.index_patterns;
    if patterns.is_empty() {
        return Resolved::NotConfigured;
    }
    // With one URL there is nothing to correspond to.
    if target.urls.len() == 1 || patterns.len() == 1 {
        return Resolved::Found(&patterns[0]);
    }
    at(patterns, url_index)
}

pub fn content_pattern<'a>(
    target: &'a FeedTarget,
    url_index: usize,
    index_pattern: &Pattern,
) -> Resolved<'a> {
    let patterns = &target.content_patterns;
    let url_count = target.urls.len();
    let index_count = target.index_patterns.len();

    if patterns.is_empty() {
        return Resolved::NotConfigured;
    }
    if patterns.len() == 1 || (url_count == 1 && index_count == 1) {
        return Resolved::Found(&patterns[0]);
    }
    if index_count == 1 && url_count != 1 {
        at(patterns, url_index)
    } else {
        at(patterns, index_pattern.index)
    }
}

pub fn index_filter_pattern<'a>(target: &'a FeedTarget, index_pattern: &Pattern) -> Resolved<'a> {
    single_or_at(&target.index_filter_patterns, index_pattern.index)
}

pub fn content_filter_pattern<'a>(
    target: &'a FeedTarget,
    content_pattern: &Pattern,
) -> Resolved<'a> {
    single_or_at(&target.content_filter_patterns, content_pattern.index)
}

pub fn pub_date_pattern(target: &FeedTarget, url_index: usize) -> Resolved<'_> {
    single_or_at(&target.pub_date_patterns, url_index)
}
