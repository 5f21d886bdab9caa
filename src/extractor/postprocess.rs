use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};

use crate::domain::FeedEntry;

/// Drop entries without a link and keep only the first entry per link.
///
/// Returns the number of entries removed.
pub fn remove_duplicate_entries(entries: &mut Vec<FeedEntry>) -> usize {
    let before = entries.len();
    let mut seen = HashSet::new();

    entries.retain(|entry| match &entry.link {
        None => {
            tracing::debug!("Dropping entry {:?} without link", entry.title);
            false
        }
        Some(link) => {
            if seen.insert(link.as_str().to_string()) {
                true
            } else {
                tracing::warn!("Removed duplicate entry {}", link);
                false
            }
        }
    });

    before - entries.len()
}

/// Give every entry without a pub-date the Last-Modified of its page, then
/// the date the page was requested, then `now`.
pub fn set_pub_dates(entries: &mut [FeedEntry], timezone: FixedOffset, now: DateTime<Utc>) {
    for entry in entries.iter_mut().filter(|e| e.pub_date.is_none()) {
        let cache = &entry.cache;
        let fallback = match cache.last_modified.or(cache.date) {
            Some(known) => known,
            None => {
                tracing::warn!("No date known for {:?}, using current time", entry.title);
                now
            }
        };
        entry.pub_date = Some(fallback.with_timezone(&timezone));
    }
}
