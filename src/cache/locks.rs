use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per URL, held across a freshness check and the store
/// update that follows it.
#[derive(Default, Clone)]
pub struct UrlLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl UrlLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, url: &str) -> OwnedMutexGuard<()> {
        let cell = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        cell.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// URLs whose stored page became new or modified during one run. A later
/// reader of the same URL sees a 304 or a fresh record, so it asks here.
#[derive(Default, Clone)]
pub struct ChangedUrls {
    urls: Arc<Mutex<HashSet<String>>>,
}

impl ChangedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    fn urls(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.urls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn mark(&self, url: &str) {
        self.urls().insert(url.to_string());
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls().contains(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_same_url_shares_a_lock() {
        let locks = UrlLocks::new();
        tokio_test::block_on(async {
            let guard = locks.lock("http://a/").await;
            drop(guard);
            let _again = locks.lock("http://a/").await;
            let _other = locks.lock("http://b/").await;
        });
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_changed_urls_are_shared_between_clones() {
        let changed = ChangedUrls::new();
        let seen_by_task = changed.clone();
        changed.mark("http://a/");

        assert!(seen_by_task.contains("http://a/"));
        assert!(!seen_by_task.contains("http://b/"));
        assert!(!ChangedUrls::new().contains("http://a/"));
    }

    #[tokio::test]
    async fn test_same_url_is_serialized() {
        let locks = UrlLocks::new();
        let guard = locks.lock("http://a/").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("http://a/").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different URL is not blocked.
        let _b = locks.lock("http://b/").await;

        drop(guard);
        contender.await.unwrap();
    }
}
