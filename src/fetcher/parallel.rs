use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use crate::app::{PagefeedError, Result};
use crate::domain::HtmlCache;
use crate::fetcher::{FetchResponse, Fetcher};

pub const DEFAULT_WORKERS: usize = 10;

/// Keeps successive requests of one target at least `interval` apart.
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.interval;
            if Instant::now() < next {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Shares a bounded pool of request slots between all targets and puts a
/// deadline on each request.
#[derive(Clone)]
pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    semaphore: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS, None)
    }

    pub fn with_workers(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        workers: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
        }
    }

    pub async fn fetch(
        &self,
        url: &str,
        prior: Option<&HtmlCache>,
        throttle: &Throttle,
    ) -> Result<FetchResponse> {
        throttle.wait().await;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PagefeedError::Other(format!("Worker pool closed: {}", e)))?;

        tracing::debug!("Fetching {}", url);
        match self.timeout {
            Some(after) => tokio::time::timeout(after, self.fetcher.fetch(url, prior))
                .await
                .map_err(|_| PagefeedError::Timeout {
                    url: url.to_string(),
                    after,
                })?,
            None => self.fetcher.fetch(url, prior).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::CacheHeaders;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowFetcher {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowFetcher {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn fetch(&self, _url: &str, _prior: Option<&HtmlCache>) -> Result<FetchResponse> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(FetchResponse {
                status: 200,
                headers: CacheHeaders::default(),
                body: b"ok".to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let slow = Arc::new(SlowFetcher::new(Duration::from_millis(200)));
        let pool = ParallelFetcher::with_workers(slow, 2, Some(Duration::from_millis(20)));
        let throttle = Throttle::new(Duration::ZERO);

        match pool.fetch("http://slow.example/", None, &throttle).await {
            Err(PagefeedError::Timeout { url, .. }) => assert_eq!(url, "http://slow.example/"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_timeout_waits() {
        let slow = Arc::new(SlowFetcher::new(Duration::from_millis(30)));
        let pool = ParallelFetcher::with_workers(slow, 1, None);
        let throttle = Throttle::new(Duration::ZERO);

        let response = pool.fetch("http://slow.example/", None, &throttle).await.unwrap();
        assert_eq!(response.body, b"ok");
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let slow = Arc::new(SlowFetcher::new(Duration::from_millis(30)));
        let pool = ParallelFetcher::with_workers(slow.clone(), 2, None);

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let throttle = Throttle::new(Duration::ZERO);
                    pool.fetch(&format!("http://example.com/{i}"), None, &throttle)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(slow.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let throttle = Throttle::new(Duration::from_millis(40));
        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
