use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::app::{PagefeedError, Result};
use crate::cache::{evaluate, is_fresh, ChangedUrls, UrlLocks};
use crate::domain::{CacheStatus, Feed, FeedEntry, FeedTarget, HtmlCache};
use crate::extractor::entries::EntryExtractor;
use crate::extractor::postprocess::{remove_duplicate_entries, set_pub_dates};
use crate::fetcher::parallel::{ParallelFetcher, Throttle};
use crate::pattern::{resolver, Resolved};
use crate::store::CacheStore;

/// Result of building one target's feed.
#[derive(Debug)]
pub struct FeedOutcome {
    pub target: Arc<FeedTarget>,
    pub feed: Feed,
    /// Whether any page behind the feed was new or modified.
    pub changed: bool,
    /// Source URLs that contributed nothing because they failed.
    pub failed_urls: usize,
}

struct UrlOutcome {
    entries: Vec<FeedEntry>,
    /// `None` when the URL was skipped without a request.
    page: Option<Arc<HtmlCache>>,
    changed: bool,
}

/// Fetches pages through the cache and turns them into feeds.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn CacheStore + Send + Sync>,
    fetcher: ParallelFetcher,
    locks: UrlLocks,
    changed: ChangedUrls,
    extractor: EntryExtractor,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CacheStore + Send + Sync>,
        fetcher: ParallelFetcher,
        extractor: EntryExtractor,
    ) -> Self {
        Self {
            store,
            fetcher,
            locks: UrlLocks::new(),
            changed: ChangedUrls::new(),
            extractor,
        }
    }

    /// A copy sharing store, fetcher and locks, with an empty set of changed
    /// URLs.
    fn for_run(&self) -> Self {
        Self {
            changed: ChangedUrls::new(),
            ..self.clone()
        }
    }

    /// Whether `page` changed in this run, here or for another target that
    /// read the same URL first.
    fn was_changed(&self, page: &HtmlCache) -> bool {
        page.status.is_changed() || self.changed.contains(&page.url)
    }

    /// Return the page for `url`, from the store while it is fresh and from
    /// the network otherwise. The store is updated before the URL lock is
    /// released.
    pub async fn load_page(&self, url: &str, throttle: &Throttle) -> Result<Arc<HtmlCache>> {
        let _guard = self.locks.lock(url).await;

        let prior = match self.store.get(url) {
            Ok(record) => Some(record),
            Err(PagefeedError::NoCacheRecord(_)) => None,
            Err(e) => return Err(e),
        };

        let requested_at = Utc::now();
        if let Some(prior) = prior.as_ref().filter(|p| is_fresh(p, requested_at)) {
            tracing::debug!("Using cached {} until {:?}", url, prior.expires);
            return Ok(Arc::new(prior.clone()));
        }

        let response = self.fetcher.fetch(url, prior.as_ref(), throttle).await?;
        let record = evaluate(url, prior.as_ref(), &response, requested_at);
        self.store.put(&record)?;
        if record.status.is_changed() {
            self.changed.mark(url);
        }

        match record.status {
            CacheStatus::New => tracing::info!("Cached new page {}", url),
            CacheStatus::Modified => tracing::info!("Page {} changed", url),
            CacheStatus::NotModified => tracing::debug!("Page {} not modified", url),
        }

        Ok(Arc::new(record))
    }

    async fn process_url(
        &self,
        target: &FeedTarget,
        url_index: usize,
        throttle: &Throttle,
        now: DateTime<Utc>,
    ) -> Result<UrlOutcome> {
        let url = target.urls[url_index].url.as_str();
        if let resolved @ (Resolved::NotConfigured | Resolved::Unmatched { .. }) =
            resolver::index_pattern(target, url_index)
        {
            tracing::warn!(
                "{}: no index pattern for {} ({:?}), not fetching it",
                target.display_title(),
                url,
                resolved
            );
            return Ok(UrlOutcome {
                entries: Vec::new(),
                page: None,
                changed: false,
            });
        }

        let page = self.load_page(url, throttle).await?;
        let mut changed = self.was_changed(&page);

        if !target.fetch_content {
            return Ok(UrlOutcome {
                entries: self.extractor.extract(target, url_index, page.clone(), now),
                page: Some(page),
                changed,
            });
        }

        let mut entries = Vec::new();
        for candidate in self.extractor.candidates(target, url_index, &page) {
            let Some(link) = candidate.link.clone() else {
                let span = candidate.span.clone();
                entries.extend(self.extractor.finish(
                    target,
                    url_index,
                    candidate,
                    &span,
                    page.clone(),
                    now,
                ));
                continue;
            };

            match self.load_page(link.as_str(), throttle).await {
                Ok(linked) => {
                    changed |= self.was_changed(&linked);
                    let html = linked.html_text();
                    entries.extend(self.extractor.finish(
                        target,
                        url_index,
                        candidate,
                        &html,
                        linked,
                        now,
                    ));
                }
                Err(e) => tracing::warn!("Skipping entry {}: {}", link, e),
            }
        }

        Ok(UrlOutcome {
            entries,
            page: Some(page),
            changed,
        })
    }

    /// Build the feed of one target. URLs are processed concurrently and
    /// merged in configuration order.
    pub async fn build_feed(&self, target: Arc<FeedTarget>) -> FeedOutcome {
        self.for_run().build_target(target).await
    }

    async fn build_target(&self, target: Arc<FeedTarget>) -> FeedOutcome {
        let now = Utc::now();
        let throttle = Arc::new(Throttle::new(target.request_interval));

        let mut handles = Vec::new();
        for source in &target.urls {
            let pipeline = self.clone();
            let target = target.clone();
            let throttle = throttle.clone();
            let url_index = source.index;

            handles.push(tokio::spawn(async move {
                pipeline
                    .process_url(&target, url_index, &throttle, now)
                    .await
            }));
        }

        let mut entries = Vec::new();
        let mut changed = false;
        let mut failed_urls = 0;
        let mut first_page = None;

        for (source, handle) in target.urls.iter().zip(handles) {
            match handle.await {
                Ok(Ok(outcome)) => {
                    changed |= outcome.changed;
                    entries.extend(outcome.entries);
                    if source.index == 0 {
                        first_page = outcome.page;
                    }
                }
                Ok(Err(e)) => {
                    failed_urls += 1;
                    tracing::error!("Failed to process {}: {}", source.url, e);
                }
                Err(e) => {
                    failed_urls += 1;
                    tracing::error!("Task join error: {}", e);
                }
            }
        }

        let removed = remove_duplicate_entries(&mut entries);
        if removed > 0 {
            tracing::debug!("{}: removed {} entries", target.display_title(), removed);
        }
        let timezone = self.extractor.timezone();
        set_pub_dates(&mut entries, timezone, now);

        let title = if target.title.is_empty() {
            first_page
                .and_then(|page| self.extractor.sanitizer().page_title(&page.html_text()))
                .unwrap_or_else(|| target.display_title().to_string())
        } else {
            target.title.clone()
        };
        let description = if target.description.is_empty() {
            title.clone()
        } else {
            target.description.clone()
        };
        let last_modified = entries
            .iter()
            .filter_map(|e| e.pub_date)
            .max()
            .unwrap_or_else(|| now.with_timezone(&timezone));

        tracing::info!(
            "{}: {} entries from {} URLs",
            title,
            entries.len(),
            target.urls.len()
        );

        let feed = Feed {
            title,
            description,
            url: target.urls.first().map(|u| u.url.clone()),
            last_modified,
            entries,
        };

        FeedOutcome {
            target,
            feed,
            changed,
            failed_urls,
        }
    }

    /// Build the feeds of all targets concurrently. Targets sharing a URL
    /// all see it as changed when any of them fetched a new version.
    pub async fn run(&self, targets: Vec<Arc<FeedTarget>>) -> Vec<FeedOutcome> {
        let run = self.for_run();
        join_all(targets.into_iter().map(|target| run.build_target(target))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::target::TargetConfig;
    use crate::extractor::sanitize::Sanitizer;
    use crate::fetcher::{CacheHeaders, FetchResponse, Fetcher, NOT_MODIFIED};
    use crate::normalizer::DateNormalizer;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use chrono::{Datelike, FixedOffset};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned pages and records request counts per URL.
    struct StubFetcher {
        pages: HashMap<String, (String, CacheHeaders)>,
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, &str, CacheHeaders)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body, headers)| {
                        (url.to_string(), (body.to_string(), headers.clone()))
                    })
                    .collect(),
                calls: Mutex::new(HashMap::new()),
                total: AtomicUsize::new(0),
            }
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str, prior: Option<&HtmlCache>) -> Result<FetchResponse> {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

            let (body, headers) = self.pages.get(url).ok_or_else(|| PagefeedError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })?;

            let unchanged = prior
                .zip(headers.etag.as_deref())
                .is_some_and(|(p, etag)| p.etag == etag);
            Ok(FetchResponse {
                status: if unchanged { NOT_MODIFIED } else { 200 },
                headers: headers.clone(),
                body: if unchanged {
                    Vec::new()
                } else {
                    body.as_bytes().to_vec()
                },
            })
        }
    }

    fn pipeline(fetcher: Arc<StubFetcher>) -> (Pipeline, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = EntryExtractor::new(
            Sanitizer::new().unwrap(),
            DateNormalizer::new(FixedOffset::east_opt(8 * 3600).unwrap()),
        );
        let pipeline = Pipeline::new(
            store.clone(),
            ParallelFetcher::with_workers(fetcher, 4, Some(Duration::from_secs(5))),
            extractor,
        );
        (pipeline, store)
    }

    const BOARD: &str = r#"<html><head><title>Notice Board</title></head><body>
<div class="item"><a href="/n/1">Opening</a><em>12 Mar</em><p>Doors open at nine.</p></div>
<div class="item"><a href="/n/2">Closing</a><em>13 Mar</em><p>Doors close at five.</p></div>
<div class="item"><a href="/n/3">Repairs</a><em>14 Mar</em><p>Lift out of order.</p></div>
</body></html>"#;

    fn board_target() -> Arc<FeedTarget> {
        let cfg = TargetConfig {
            urls: vec!["http://board.example/".into()],
            index_patterns: vec![r#"<div class="item"><a href="{link}">{title}</a>{any}</div>"#
                .into()],
            content_patterns: vec!["<em>{pubdate}</em><p>{description}</p>".into()],
            pub_date_patterns: vec!["{day} {month}".into()],
            feed_path: "board.xml".into(),
            ..Default::default()
        };
        Arc::new(cfg.compile().unwrap())
    }

    #[tokio::test]
    async fn test_build_feed_end_to_end() {
        let fetcher = Arc::new(StubFetcher::new(&[(
            "http://board.example/",
            BOARD,
            CacheHeaders::default(),
        )]));
        let (pipeline, store) = pipeline(fetcher.clone());

        let outcome = pipeline.build_feed(board_target()).await;
        let feed = &outcome.feed;

        assert!(outcome.changed);
        assert_eq!(outcome.failed_urls, 0);
        assert_eq!(feed.title, "Notice Board");
        assert_eq!(feed.description, "Notice Board");
        assert_eq!(feed.url.as_ref().unwrap().as_str(), "http://board.example/");
        assert_eq!(feed.entries.len(), 3);

        let links: Vec<_> = feed
            .entries
            .iter()
            .map(|e| e.link.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(
            links,
            vec![
                "http://board.example/n/1",
                "http://board.example/n/2",
                "http://board.example/n/3"
            ]
        );
        assert_eq!(feed.entries[2].content, "Lift out of order.");

        let this_year = Utc::now()
            .with_timezone(&FixedOffset::east_opt(8 * 3600).unwrap())
            .year();
        for (entry, day) in feed.entries.iter().zip([12, 13, 14]) {
            let date = entry.pub_date.unwrap();
            assert_eq!((date.year(), date.month(), date.day()), (this_year, 3, day));
        }
        assert_eq!(feed.last_modified, feed.entries[2].pub_date.unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fresh_page_is_not_refetched() {
        let headers = CacheHeaders {
            cache_control: Some("public, max-age=3600".into()),
            ..Default::default()
        };
        let fetcher = Arc::new(StubFetcher::new(&[("http://board.example/", BOARD, headers)]));
        let (pipeline, _store) = pipeline(fetcher.clone());
        let throttle = Throttle::new(Duration::ZERO);

        let first = pipeline.load_page("http://board.example/", &throttle).await.unwrap();
        let second = pipeline.load_page("http://board.example/", &throttle).await.unwrap();

        assert_eq!(first.status, CacheStatus::New);
        assert_eq!(second.status, CacheStatus::NotModified);
        assert_eq!(second.html, BOARD.as_bytes());
        assert_eq!(fetcher.calls("http://board.example/"), 1);
    }

    #[tokio::test]
    async fn test_unchanged_page_reports_not_changed() {
        let headers = CacheHeaders {
            etag: Some("\"v1\"".into()),
            ..Default::default()
        };
        let fetcher = Arc::new(StubFetcher::new(&[("http://board.example/", BOARD, headers)]));
        let (pipeline, _store) = pipeline(fetcher.clone());

        let first = pipeline.build_feed(board_target()).await;
        let second = pipeline.build_feed(board_target()).await;

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.feed.entries.len(), 3);
        assert_eq!(fetcher.calls("http://board.example/"), 2);
    }

    #[tokio::test]
    async fn test_failed_url_contributes_nothing() {
        let fetcher = Arc::new(StubFetcher::new(&[(
            "http://board.example/",
            BOARD,
            CacheHeaders::default(),
        )]));
        let (pipeline, _store) = pipeline(fetcher);

        let cfg = TargetConfig {
            title: "Two boards".into(),
            urls: vec!["http://board.example/".into(), "http://gone.example/".into()],
            index_patterns: vec![r#"<a href="{link}">{title}</a>"#.into()],
            feed_path: "boards.xml".into(),
            ..Default::default()
        };
        let outcome = pipeline.build_feed(Arc::new(cfg.compile().unwrap())).await;

        assert_eq!(outcome.failed_urls, 1);
        assert_eq!(outcome.feed.title, "Two boards");
        assert_eq!(outcome.feed.entries.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_links_across_urls_are_merged() {
        let other = r#"<a href="http://board.example/n/2">Closing again</a><a href="/x">X</a>"#;
        let fetcher = Arc::new(StubFetcher::new(&[
            ("http://board.example/", BOARD, CacheHeaders::default()),
            ("http://other.example/", other, CacheHeaders::default()),
        ]));
        let (pipeline, _store) = pipeline(fetcher);

        let cfg = TargetConfig {
            urls: vec!["http://board.example/".into(), "http://other.example/".into()],
            index_patterns: vec![r#"<a href="{link}">{title}</a>"#.into()],
            feed_path: "boards.xml".into(),
            ..Default::default()
        };
        let outcome = pipeline.build_feed(Arc::new(cfg.compile().unwrap())).await;

        let titles: Vec<_> = outcome.feed.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Opening", "Closing", "Repairs", "X"]);
    }

    #[tokio::test]
    async fn test_fetch_content_reads_linked_pages() {
        let index = r#"<li><a href="/a/1">One</a></li><li><a href="/a/2">Two</a></li>"#;
        let fetcher = Arc::new(StubFetcher::new(&[
            ("http://site.example/", index, CacheHeaders::default()),
            (
                "http://site.example/a/1",
                "<article> Body one </article>",
                CacheHeaders::default(),
            ),
        ]));
        let (pipeline, _store) = pipeline(fetcher.clone());

        let cfg = TargetConfig {
            title: "Site".into(),
            urls: vec!["http://site.example/".into()],
            index_patterns: vec![r#"<li><a href="{link}">{title}</a></li>"#.into()],
            content_patterns: vec!["<article>{description}</article>".into()],
            feed_path: "site.xml".into(),
            fetch_content: true,
            ..Default::default()
        };
        let outcome = pipeline.build_feed(Arc::new(cfg.compile().unwrap())).await;

        assert_eq!(outcome.feed.entries.len(), 1);
        let entry = &outcome.feed.entries[0];
        assert_eq!(entry.content, "Body one");
        assert_eq!(entry.cache.url, "http://site.example/a/1");
        assert_eq!(fetcher.calls("http://site.example/a/2"), 1);
    }

    #[tokio::test]
    async fn test_run_shares_one_fetch_between_targets() {
        let headers = CacheHeaders {
            etag: Some("\"v1\"".into()),
            cache_control: Some("max-age=3600".into()),
            ..Default::default()
        };
        let fetcher = Arc::new(StubFetcher::new(&[("http://board.example/", BOARD, headers)]));
        let (pipeline, store) = pipeline(fetcher.clone());

        let outcomes = pipeline.run(vec![board_target(), board_target()]).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.feed.entries.len() == 3));
        // the second target reads the fresh record, yet still sees the change
        assert!(outcomes.iter().all(|o| o.changed));
        assert_eq!(fetcher.calls("http://board.example/"), 1);
        assert_eq!(fetcher.total.load(Ordering::SeqCst), 1);

        let stored = store.get("http://board.example/").unwrap();
        assert_eq!(stored.etag, "\"v1\"");
        assert_eq!(stored.html, BOARD.as_bytes());
        assert_eq!(store.count().unwrap(), 1);

        // a new run starts with no changed URLs
        let again = pipeline.run(vec![board_target(), board_target()]).await;
        assert!(again.iter().all(|o| !o.changed));
        assert_eq!(fetcher.total.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_url_without_index_pattern_is_not_fetched() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("http://board.example/", BOARD, CacheHeaders::default()),
            ("http://board.example/b", BOARD, CacheHeaders::default()),
        ]));
        let (pipeline, _store) = pipeline(fetcher.clone());

        let cfg = TargetConfig {
            title: "Boards".into(),
            urls: vec![
                "http://board.example/".into(),
                "http://board.example/b".into(),
                "http://board.example/c".into(),
            ],
            index_patterns: vec![
                r#"<a href="{link}">{title}</a>"#.into(),
                r#"<em>{title}</em>"#.into(),
                "{title}".into(),
            ],
            feed_path: "boards.xml".into(),
            ..Default::default()
        };
        let mut target = cfg.compile().unwrap();
        target.index_patterns.truncate(2);

        let outcome = pipeline.build_feed(Arc::new(target)).await;

        assert_eq!(outcome.failed_urls, 0);
        assert_eq!(fetcher.calls("http://board.example/c"), 0);
        assert_eq!(fetcher.total.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.feed.entries.len(), 3);
    }
}
