//! Resolved-URL cache with request coalescing.
//!
//! Signed URLs are expensive to mint (a network round-trip) and expire on
//! their own schedule, so the resolver keeps each resolved URL for a TTL
//! deliberately shorter than the signed URL's validity: a cached URL is
//! always refreshed before the backing store would reject it.
//!
//! Concurrent callers asking for the same key while a resolution is in
//! flight are coalesced onto the first caller's result - at most one
//! backing call per key at any moment. The in-flight entry is removed
//! before the leading call returns, success or failure, so a failed
//! resolution can always be retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::resolve::{SourceError, UrlSource};

/// Default freshness window for resolved URLs: 50 minutes.
///
/// Signed URLs are requested with a 60-minute validity; the 10-minute
/// margin guarantees a cached URL is never handed out close to its expiry.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(50 * 60);

/// Errors from URL resolution.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The backing source failed to produce a URL.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The leading resolution was dropped before producing a result.
    #[error("In-flight resolution was interrupted")]
    Interrupted,
}

/// A successfully resolved URL with its resolution instant.
///
/// Entries are replaced, never mutated, on re-resolution.
#[derive(Debug, Clone)]
pub struct ResolvedUrl {
    /// Cache key (`bucket/key`).
    pub key: String,
    /// The fetchable URL.
    pub url: String,
    /// When this URL was resolved; freshness is measured from here.
    pub resolved_at: Instant,
}

/// Point-in-time resolver counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverStats {
    /// Calls answered from the cache without suspension.
    pub cache_hits: u64,
    /// Calls that missed the cache (coalesced or leading).
    pub cache_misses: u64,
    /// Actual backing-source invocations.
    pub backing_calls: u64,
    /// Calls that joined an in-flight resolution.
    pub coalesced: u64,
}

type InFlightResult = Result<ResolvedUrl, ResolveError>;

/// Resolves storage keys to URLs with a TTL cache and single-flight
/// de-duplication.
pub struct ResourceResolver {
    source: Arc<dyn UrlSource>,
    ttl: Duration,
    cache: Mutex<HashMap<String, ResolvedUrl>>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<InFlightResult>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    backing_calls: AtomicU64,
    coalesced: AtomicU64,
}

impl ResourceResolver {
    /// Create a resolver with the default TTL.
    pub fn new(source: Arc<dyn UrlSource>) -> Self {
        Self::with_ttl(source, DEFAULT_URL_TTL)
    }

    /// Create a resolver with a custom TTL (tests use short windows).
    pub fn with_ttl(source: Arc<dyn UrlSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            backing_calls: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Resolve `key` within `bucket` to a URL.
    ///
    /// Fast path: a fresh cache entry is returned without suspension.
    /// Otherwise the call either joins an in-flight resolution for the same
    /// key or performs the backing call itself, caching the result.
    ///
    /// # Errors
    ///
    /// Backing failures propagate to every caller waiting on the key; the
    /// in-flight entry is cleared in all cases so the next call retries.
    pub async fn resolve(&self, bucket: &str, key: &str) -> Result<ResolvedUrl, ResolveError> {
        let cache_key = format!("{}/{}", bucket, key);

        if let Some(entry) = self.fresh(&cache_key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Join an in-flight resolution, or become the leader for this key.
        // The decision and the subscription happen under one lock so a
        // joiner can never miss the leader's broadcast.
        enum Role {
            Cached(ResolvedUrl),
            Leader(broadcast::Sender<InFlightResult>),
            Joiner(broadcast::Receiver<InFlightResult>),
        }

        let role = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&cache_key) {
                Some(tx) => Role::Joiner(tx.subscribe()),
                // A leader that completed between our cache check and this
                // lock has already populated the cache; re-check before
                // starting a redundant backing call
                None => match self.fresh(&cache_key) {
                    Some(entry) => Role::Cached(entry),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        in_flight.insert(cache_key.clone(), tx.clone());
                        Role::Leader(tx)
                    }
                },
            }
        };

        match role {
            Role::Cached(entry) => Ok(entry),
            Role::Joiner(mut rx) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %cache_key, "Joining in-flight resolution");
                match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => Err(ResolveError::Interrupted),
                }
            }
            Role::Leader(tx) => {
                // Guarantees the in-flight entry is cleared even if this
                // future is dropped mid-resolution; waiters then observe a
                // closed channel and report Interrupted.
                let _guard = InFlightGuard {
                    resolver: self,
                    key: &cache_key,
                };

                self.backing_calls.fetch_add(1, Ordering::Relaxed);
                let result = match self.source.resolve_url(bucket, key).await {
                    Ok(url) => {
                        let entry = ResolvedUrl {
                            key: cache_key.clone(),
                            url,
                            resolved_at: Instant::now(),
                        };
                        self.cache.lock().insert(cache_key.clone(), entry.clone());
                        Ok(entry)
                    }
                    Err(e) => {
                        warn!(key = %cache_key, error = %e, "URL resolution failed");
                        Err(ResolveError::Source(e))
                    }
                };

                drop(_guard);
                // Waiters subscribed while the entry existed; ignore the
                // send error when nobody joined.
                let _ = tx.send(result.clone());
                result
            }
        }
    }

    /// Return a fresh cache entry for the key, if one exists.
    fn fresh(&self, cache_key: &str) -> Option<ResolvedUrl> {
        let cache = self.cache.lock();
        cache
            .get(cache_key)
            .filter(|entry| entry.resolved_at.elapsed() < self.ttl)
            .cloned()
    }

    /// Snapshot the resolver counters.
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            backing_calls: self.backing_calls.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached URL. Used on route reload.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

/// Removes the in-flight entry when the leading resolution exits.
struct InFlightGuard<'a> {
    resolver: &'a ResourceResolver,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.resolver.in_flight.lock().remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::BoxFuture;
    use std::sync::atomic::AtomicUsize;

    /// Backing source with a scripted delay, failure switch, and call count.
    struct MockSource {
        calls: AtomicUsize,
        delay: Duration,
        fail: std::sync::atomic::AtomicBool,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl UrlSource for MockSource {
        fn resolve_url<'a>(
            &'a self,
            bucket: &'a str,
            key: &'a str,
        ) -> BoxFuture<'a, Result<String, SourceError>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                if self.fail.load(Ordering::SeqCst) {
                    return Err(SourceError::Http("mock failure".to_string()));
                }
                Ok(format!("https://cdn.example/{}/{}?gen={}", bucket, key, n))
            })
        }
    }

    #[tokio::test]
    async fn test_resolve_caches_result() {
        let source = Arc::new(MockSource::new());
        let resolver = ResourceResolver::new(source.clone());

        let first = resolver.resolve("images", "a.webp").await.unwrap();
        let second = resolver.resolve("images", "a.webp").await.unwrap();

        assert_eq!(source.calls(), 1, "second call must not hit the backing source");
        assert_eq!(first.url, second.url);
        assert_eq!(first.key, "images/a.webp");

        let stats = resolver.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.backing_calls, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_resolve_independently() {
        let source = Arc::new(MockSource::new());
        let resolver = ResourceResolver::new(source.clone());

        resolver.resolve("images", "a.webp").await.unwrap();
        resolver.resolve("images", "b.webp").await.unwrap();
        resolver.resolve("thumbnails", "a.webp").await.unwrap();

        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_coalesce() {
        let source = Arc::new(MockSource::with_delay(Duration::from_millis(50)));
        let resolver = Arc::new(ResourceResolver::new(source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("images", "a.webp").await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let urls: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap().url)
            .collect();

        assert_eq!(source.calls(), 1, "all callers must share one backing call");
        assert!(
            urls.iter().all(|u| u == &urls[0]),
            "all callers must observe the same URL"
        );
        assert!(resolver.stats().coalesced >= 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_one_new_resolution() {
        let source = Arc::new(MockSource::new());
        let resolver = ResourceResolver::with_ttl(source.clone(), Duration::from_millis(40));

        let first = resolver.resolve("images", "a.webp").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = resolver.resolve("images", "a.webp").await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_ne!(first.url, second.url, "expired entry must be re-resolved");
        assert!(second.resolved_at > first.resolved_at);
    }

    #[tokio::test]
    async fn test_entry_within_ttl_is_served_from_cache() {
        let source = Arc::new(MockSource::new());
        let resolver = ResourceResolver::with_ttl(source.clone(), Duration::from_secs(60));

        resolver.resolve("images", "a.webp").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.resolve("images", "a.webp").await.unwrap();

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates_and_clears_in_flight() {
        let source = Arc::new(MockSource::new());
        source.fail.store(true, Ordering::SeqCst);
        let resolver = ResourceResolver::new(source.clone());

        let result = resolver.resolve("images", "a.webp").await;
        assert!(matches!(result, Err(ResolveError::Source(_))));
        assert_eq!(source.calls(), 1);

        // A later call retries and can succeed
        source.fail.store(false, Ordering::SeqCst);
        let result = resolver.resolve("images", "a.webp").await;
        assert!(result.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_coalesced_waiters() {
        let source = Arc::new(MockSource::with_delay(Duration::from_millis(50)));
        source.fail.store(true, Ordering::SeqCst);
        let resolver = Arc::new(ResourceResolver::new(source.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("images", "a.webp").await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_err());
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_re_resolution() {
        let source = Arc::new(MockSource::new());
        let resolver = ResourceResolver::new(source.clone());

        resolver.resolve("images", "a.webp").await.unwrap();
        resolver.clear();
        resolver.resolve("images", "a.webp").await.unwrap();

        assert_eq!(source.calls(), 2);
    }
}
