//! Cached shell entries and the lookup status classification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use ppr_engine::Shell;

/// Externally observable classification of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Freshly computed on a miss.
    Prerender,
    /// Served from a fresh entry.
    Hit,
    /// First successful lookup of an entry re-rendered after invalidation.
    Revalidated,
}

impl CacheStatus {
    /// The wire value for the cache-status response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prerender => "PRERENDER",
            Self::Hit => "HIT",
            Self::Revalidated => "REVALIDATED",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cached shell: the structured phase-1 output plus its pre-encoded
/// document and component-stream forms.
///
/// Freshness flags live on the entry so that the whole entry can be
/// published atomically with a single map write.
#[derive(Debug)]
pub struct ShellEntry {
    /// The structured shell, resumed per request as needed.
    pub shell: Shell,
    /// Encoded full document with holes still postponed.
    pub document: String,
    /// Encoded component stream with holes still postponed.
    pub stream: String,
    /// Whether this is a generic fallback shell rather than the
    /// route-specific one.
    pub fallback: bool,
    /// When the entry was created.
    pub created_at: SystemTime,
    stale: AtomicBool,
    just_revalidated: AtomicBool,
}

impl ShellEntry {
    /// Create a fresh entry.
    pub fn new(shell: Shell, document: String, stream: String, fallback: bool) -> Self {
        Self {
            shell,
            document,
            stream,
            fallback,
            created_at: SystemTime::now(),
            stale: AtomicBool::new(false),
            just_revalidated: AtomicBool::new(false),
        }
    }

    /// Whether the cached shell still carries postponed holes.
    pub fn is_postponed(&self) -> bool {
        self.shell.is_postponed()
    }

    /// Whether an invalidate call has marked this entry stale.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Mark the entry stale. Returns true the first time, false on
    /// repeated (idempotent) invalidations.
    pub(crate) fn mark_stale(&self) -> bool {
        !self.stale.swap(true, Ordering::AcqRel)
    }

    /// Flag the entry as the product of a revalidation render.
    pub(crate) fn mark_revalidated(&self) {
        self.just_revalidated.store(true, Ordering::Release);
    }

    /// Consume the just-revalidated flag. True exactly once per entry.
    pub(crate) fn take_revalidated(&self) -> bool {
        self.just_revalidated.swap(false, Ordering::AcqRel)
    }
}
