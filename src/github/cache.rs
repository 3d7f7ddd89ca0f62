//! Per-client response cache with single-flight coalescing.
//!
//! Entries never expire on their own. They are dropped when a fetch fails,
//! when the owner calls [`ResponseCache::clear`] or
//! [`ResponseCache::clear_all`], and when the client is destroyed.
//!
//! Concurrent [`ResponseCache::get_or_fetch`] calls for one key share a
//! single upstream fetch: the first caller runs it and every other caller
//! waits on the same cell, so all of them observe the same `Ok` value or the
//! same `Err`. A failed fetch clears the whole cache.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

/// Client operation a cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// `GET /repos/{owner}/{repo}`.
    GetRepository,
    /// `GET /repos/{owner}/{repo}/pulls/{number}`.
    GetPullRequest,
    /// `GET /repos/{owner}/{repo}/pulls/{number}/reviews`.
    GetPullRequestReviews,
}

impl Operation {
    /// Stable label used in logs and telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetRepository => "get_repository",
            Self::GetPullRequest => "get_pull_request",
            Self::GetPullRequestReviews => "get_pull_request_reviews",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identity of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Operation that produced the value.
    pub operation: Operation,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number for pull request scoped operations.
    pub number: Option<u64>,
}

impl CacheKey {
    /// Key for a repository lookup.
    #[must_use]
    pub fn repository(owner: &str, repo: &str) -> Self {
        Self {
            operation: Operation::GetRepository,
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            number: None,
        }
    }

    /// Key for an operation scoped to one pull request.
    #[must_use]
    pub fn pull_request(operation: Operation, owner: &str, repo: &str, number: u64) -> Self {
        Self {
            operation,
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            number: Some(number),
        }
    }
}

/// A cached value and when it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// Insertion time.
    pub inserted_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Utc::now(),
        }
    }
}

type Flight<V, E> = Arc<OnceCell<Result<V, E>>>;

struct CacheState<V, E> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    in_flight: HashMap<CacheKey, Flight<V, E>>,
    /// Bumped by `clear_all` so fetches started earlier cannot repopulate.
    generation: u64,
}

/// Key to value store with single-flight fetches.
pub struct ResponseCache<V, E> {
    state: Mutex<CacheState<V, E>>,
}

impl<V, E> ResponseCache<V, E> {
    fn lock(&self) -> MutexGuard<'_, CacheState<V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V, E> fmt::Debug for ResponseCache<V, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        formatter
            .debug_struct("ResponseCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl<V, E> Default for ResponseCache<V, E> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                generation: 0,
            }),
        }
    }
}

impl<V: Clone, E: Clone> ResponseCache<V, E> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the cached value for `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns the cached entry for `key`, including its insertion time.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.lock().entries.get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: CacheKey, value: V) {
        self.lock().entries.insert(key, CacheEntry::new(value));
    }

    /// Removes the entry for `key`.
    pub fn clear(&self, key: &CacheKey) {
        self.lock().entries.remove(key);
    }

    /// Removes every entry and forgets every in-flight fetch.
    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.in_flight.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns the cached value or runs `fetch` once for all concurrent
    /// callers of the same key.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, cloned to every waiting caller. The cache is
    /// emptied before the error is returned.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let (flight, generation) = {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get(&key) {
                return Ok(entry.value.clone());
            }
            let generation = state.generation;
            let flight = match state.in_flight.get(&key) {
                Some(existing) => {
                    debug!(
                        operation = %key.operation,
                        owner = %key.owner,
                        repo = %key.repo,
                        "joining in-flight fetch"
                    );
                    Arc::clone(existing)
                }
                None => {
                    let created: Flight<V, E> = Arc::new(OnceCell::new());
                    state.in_flight.insert(key.clone(), Arc::clone(&created));
                    created
                }
            };
            (flight, generation)
        };

        flight
            .get_or_init(|| async {
                let outcome = fetch().await;
                self.settle(&key, &flight, generation, &outcome);
                outcome
            })
            .await
            .clone()
    }

    fn settle(
        &self,
        key: &CacheKey,
        flight: &Flight<V, E>,
        generation: u64,
        outcome: &Result<V, E>,
    ) {
        let mut state = self.lock();
        if state
            .in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            state.in_flight.remove(key);
        }

        match outcome {
            Ok(value) if state.generation == generation => {
                state
                    .entries
                    .insert(key.clone(), CacheEntry::new(value.clone()));
            }
            Ok(_) => {}
            Err(_) => state.entries.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use rstest::{fixture, rstest};

    use super::{CacheKey, Operation, ResponseCache};

    type TestCache = ResponseCache<String, String>;

    #[fixture]
    fn cache() -> TestCache {
        ResponseCache::new()
    }

    fn slow_fetch(
        calls: &AtomicU32,
        outcome: Result<String, String>,
    ) -> impl Future<Output = Result<String, String>> + '_ {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            outcome
        }
    }

    #[rstest]
    fn put_get_and_clear(cache: TestCache) {
        let key = CacheKey::repository("octo", "cat");
        cache.put(key.clone(), "value".to_owned());

        assert_eq!(cache.get(&key).as_deref(), Some("value"));
        assert!(cache.entry(&key).is_some());

        cache.clear(&key);
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[rstest]
    fn clear_all_empties_every_slot(cache: TestCache) {
        cache.put(CacheKey::repository("octo", "a"), "a".to_owned());
        cache.put(
            CacheKey::pull_request(Operation::GetPullRequest, "octo", "a", 1),
            "pr".to_owned(),
        );
        assert_eq!(cache.len(), 2);

        cache.clear_all();

        assert!(cache.is_empty());
    }

    #[test]
    fn keys_distinguish_operation_and_number() {
        let pull = CacheKey::pull_request(Operation::GetPullRequest, "octo", "cat", 1);
        let reviews = CacheKey::pull_request(Operation::GetPullRequestReviews, "octo", "cat", 1);
        let other = CacheKey::pull_request(Operation::GetPullRequest, "octo", "cat", 2);

        assert_ne!(pull, reviews);
        assert_ne!(pull, other);
        assert_ne!(CacheKey::repository("a", "x"), CacheKey::repository("a", "y"));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn concurrent_fetches_share_one_call(cache: TestCache) {
        let calls = AtomicU32::new(0);
        let key = CacheKey::repository("octo", "cat");

        let (first, second, third) = tokio::join!(
            cache.get_or_fetch(key.clone(), || slow_fetch(&calls, Ok("repo".to_owned()))),
            cache.get_or_fetch(key.clone(), || slow_fetch(&calls, Ok("repo".to_owned()))),
            cache.get_or_fetch(key.clone(), || slow_fetch(&calls, Ok("repo".to_owned()))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.as_deref(), Ok("repo"));
        assert_eq!(second.as_deref(), Ok("repo"));
        assert_eq!(third.as_deref(), Ok("repo"));
        assert_eq!(cache.get(&key).as_deref(), Some("repo"));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_observe_the_same_failure(cache: TestCache) {
        let calls = AtomicU32::new(0);
        let key = CacheKey::repository("octo", "cat");

        let (first, second) = tokio::join!(
            cache.get_or_fetch(key.clone(), || slow_fetch(&calls, Err("boom".to_owned()))),
            cache.get_or_fetch(key.clone(), || slow_fetch(&calls, Err("boom".to_owned()))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, Err("boom".to_owned()));
        assert_eq!(second, Err("boom".to_owned()));
    }

    #[rstest]
    #[tokio::test]
    async fn cached_value_skips_the_fetch(cache: TestCache) {
        let calls = AtomicU32::new(0);
        let key = CacheKey::repository("octo", "cat");

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(key.clone(), || slow_fetch(&calls, Ok("repo".to_owned())))
                .await;
            assert_eq!(value.as_deref(), Ok("repo"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn failure_clears_every_entry_and_next_call_refetches(cache: TestCache) {
        let calls = AtomicU32::new(0);
        let sibling = CacheKey::repository("octo", "sibling");
        let key = CacheKey::repository("octo", "cat");
        cache.put(sibling.clone(), "cached".to_owned());

        let failed = cache
            .get_or_fetch(key.clone(), || slow_fetch(&calls, Err("boom".to_owned())))
            .await;
        assert!(failed.is_err());
        assert!(cache.get(&sibling).is_none());

        let recovered = cache
            .get_or_fetch(key, || slow_fetch(&calls, Ok("repo".to_owned())))
            .await;
        assert_eq!(recovered.as_deref(), Ok("repo"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn clear_all_during_fetch_discards_late_value(cache: TestCache) {
        let calls = AtomicU32::new(0);
        let key = CacheKey::repository("octo", "cat");

        let fetch = cache.get_or_fetch(key.clone(), || slow_fetch(&calls, Ok("stale".to_owned())));
        let clear = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.clear_all();
        };
        let (value, ()) = tokio::join!(fetch, clear);

        assert_eq!(value.as_deref(), Ok("stale"));
        assert!(cache.get(&key).is_none());
    }
}
