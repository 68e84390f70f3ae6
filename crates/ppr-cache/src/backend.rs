//! Pluggable entry persistence.
//!
//! The observable state machine is fixed by `ShellStore`; where entries
//! live (in-memory, distributed) is a backend concern.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use ppr_engine::RouteKey;

use crate::entry::ShellEntry;

/// Entry store backend trait.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Load the entry for a key.
    async fn get(&self, key: &RouteKey) -> Option<Arc<ShellEntry>>;

    /// Publish an entry for a key, replacing any prior entry whole.
    async fn put(&self, key: RouteKey, entry: Arc<ShellEntry>);

    /// Drop the entry for a key.
    async fn remove(&self, key: &RouteKey);
}

/// In-memory entry store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<RouteKey, Arc<ShellEntry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RouteKey, Arc<ShellEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn get(&self, key: &RouteKey) -> Option<Arc<ShellEntry>> {
        self.lock().get(key).cloned()
    }

    async fn put(&self, key: RouteKey, entry: Arc<ShellEntry>) {
        self.lock().insert(key, entry);
    }

    async fn remove(&self, key: &RouteKey) {
        self.lock().remove(key);
    }
}
