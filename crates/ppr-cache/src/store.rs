//! Per-route-key shell store with explicit freshness states.
//!
//! State machine per key: `absent -> fresh` on a successful render;
//! `fresh -> stale-pending-revalidate` on invalidate; back to `fresh` when
//! the next render succeeds, replacing the entry whole. A failed render
//! leaves the prior entry serving and surfaces the error to every waiter of
//! that render.

use std::sync::Arc;

use futures::Future;
use ppr_engine::RouteKey;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{EntryStore, MemoryStore};
use crate::entry::{CacheStatus, ShellEntry};
use crate::flight::SingleFlight;

/// Cache operation errors. Cloneable so one failure fans out to every
/// waiter of the shared render.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The render backing a cache fill failed.
    #[error("render failed: {0}")]
    Render(String),
}

/// Shared output of one single-flight attempt. `rendered` is false when the
/// flight found a fresh entry already published and had nothing to do.
#[derive(Clone)]
struct FlightOutcome {
    entry: Arc<ShellEntry>,
    rendered: bool,
    revalidation: bool,
}

type RenderResult = Result<FlightOutcome, CacheError>;

/// Shell cache with single-flight render sharing.
pub struct ShellStore {
    backend: Arc<dyn EntryStore>,
    flight: Arc<SingleFlight<RouteKey, RenderResult>>,
}

impl ShellStore {
    /// Create a store over the in-memory backend.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(MemoryStore::new()))
    }

    /// Create a store over a custom backend.
    pub fn with_backend(backend: Arc<dyn EntryStore>) -> Self {
        Self {
            backend,
            flight: Arc::new(SingleFlight::new()),
        }
    }

    /// Whether an entry (fresh or stale) exists for the key.
    pub async fn contains(&self, key: &RouteKey) -> bool {
        self.backend.get(key).await.is_some()
    }

    /// Load the entry for a key without affecting lookup status.
    pub async fn peek(&self, key: &RouteKey) -> Option<Arc<ShellEntry>> {
        self.backend.get(key).await
    }

    /// Move a fresh entry to stale-pending-revalidate. Idempotent; returns
    /// before any re-render starts. False when no entry exists.
    pub async fn invalidate(&self, key: &RouteKey) -> bool {
        match self.backend.get(key).await {
            Some(entry) => {
                if entry.mark_stale() {
                    debug!(key = %key, "shell marked stale pending revalidation");
                }
                true
            }
            None => false,
        }
    }

    /// Look up the entry for a key, rendering when absent or stale.
    ///
    /// Concurrent callers that miss on the same key share a single render;
    /// every waiter receives its result. The miss decision is re-made inside
    /// the flight against the backend's current state, so a lookup whose
    /// backend read raced a just-published entry joins that entry instead of
    /// starting a second render. Lookup classification: `Prerender` for
    /// every waiter of a first render, `Revalidated` exactly once for an
    /// entry produced by a revalidation render, `Hit` otherwise. A failed
    /// revalidation serves the prior (stale) entry as a `Hit`; a failed
    /// first render is surfaced to the caller.
    pub async fn get_or_render<F, Fut>(
        &self,
        key: &RouteKey,
        render: F,
    ) -> Result<(Arc<ShellEntry>, CacheStatus), CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ShellEntry, CacheError>> + Send + 'static,
    {
        if let Some(entry) = self.backend.get(key).await {
            if !entry.is_stale() {
                return Ok((Arc::clone(&entry), self.classify_fresh(&entry)));
            }
        }

        match self.run_flight(key, render).await {
            Ok(outcome) => {
                let status = if outcome.rendered && !outcome.revalidation {
                    CacheStatus::Prerender
                } else {
                    self.classify_fresh(&outcome.entry)
                };
                Ok((outcome.entry, status))
            }
            // Keep the prior entry, if any, as the response source.
            Err(error) => match self.backend.get(key).await {
                Some(prior) => {
                    warn!(key = %key, %error, "revalidation failed, serving stale shell");
                    Ok((prior, CacheStatus::Hit))
                }
                None => Err(error),
            },
        }
    }

    fn classify_fresh(&self, entry: &Arc<ShellEntry>) -> CacheStatus {
        if entry.take_revalidated() {
            CacheStatus::Revalidated
        } else {
            CacheStatus::Hit
        }
    }

    async fn run_flight<F, Fut>(&self, key: &RouteKey, render: F) -> RenderResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ShellEntry, CacheError>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let flight_key = key.clone();
        self.flight
            .run(key.clone(), move || async move {
                // The caller's lookup and flight membership are not atomic;
                // only the state observed here decides whether to render.
                let revalidation = match backend.get(&flight_key).await {
                    Some(existing) if !existing.is_stale() => {
                        return Ok(FlightOutcome {
                            entry: existing,
                            rendered: false,
                            revalidation: false,
                        });
                    }
                    Some(_) => true,
                    None => false,
                };

                match render().await {
                    Ok(entry) => {
                        let entry = Arc::new(entry);
                        if revalidation {
                            entry.mark_revalidated();
                        }
                        // Single visible write per successful render.
                        backend.put(flight_key.clone(), Arc::clone(&entry)).await;
                        debug!(key = %flight_key, revalidation, "shell published");
                        Ok(FlightOutcome {
                            entry,
                            rendered: true,
                            revalidation,
                        })
                    }
                    Err(error) => {
                        warn!(key = %flight_key, %error, "shell render failed");
                        Err(error)
                    }
                }
            })
            .await
    }
}

impl Default for ShellStore {
    fn default() -> Self {
        Self::new()
    }
}
