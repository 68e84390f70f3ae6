//! Single-flight registry for in-progress renders.
//!
//! Maps a key to a shared future so that concurrent callers of the same key
//! share one computation, with explicit completion fan-out: every waiter
//! receives the one result, including failures.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, Shared};
use futures::{Future, FutureExt};

/// Registry of in-flight computations keyed by `K`.
pub struct SingleFlight<K, T> {
    inflight: Mutex<HashMap<K, Shared<BoxFuture<'static, T>>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Join the in-flight computation for `key`, or start one with `make`.
    ///
    /// `make` runs at most once per flight; every concurrent caller awaits
    /// the same shared future and receives a clone of its output. The key is
    /// deregistered by the computation itself before the result is
    /// published, so later callers start a new flight.
    pub async fn run<F, Fut>(self: &Arc<Self>, key: K, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.lock();
            if let Some(existing) = inflight.get(&key) {
                existing.clone()
            } else {
                let registry = Arc::clone(self);
                let owned = key.clone();
                let work = make();
                let shared = async move {
                    let out = work.await;
                    registry.lock().remove(&owned);
                    out
                }
                .boxed()
                .shared();
                inflight.insert(key, shared.clone());
                shared
            }
        };
        shared.await
    }

    /// Number of computations currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no computation is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Shared<BoxFuture<'static, T>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let flight: Arc<SingleFlight<&'static str, usize>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run("key", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(flight.is_empty());
    }

    #[tokio::test]
    async fn test_failure_fans_out_to_every_waiter() {
        let flight: Arc<SingleFlight<&'static str, Result<usize, String>>> =
            Arc::new(SingleFlight::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flight = Arc::clone(&flight);
            handles.push(tokio::spawn(async move {
                flight
                    .run("key", || async {
                        tokio::task::yield_now().await;
                        Err("boom".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("boom".to_string()));
        }
    }

    #[tokio::test]
    async fn test_new_flight_starts_after_completion() {
        let flight: Arc<SingleFlight<&'static str, usize>> = Arc::new(SingleFlight::new());
        let first = flight.run("key", || async { 1 }).await;
        let second = flight.run("key", || async { 2 }).await;
        assert_eq!((first, second), (1, 2));
    }
}
