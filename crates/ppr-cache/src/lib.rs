//! Shell caching for partially prerendered routes.
//!
//! This crate provides:
//! - `ShellEntry` - A cached shell with its encoded forms and freshness flags
//! - `CacheStatus` - The externally observable lookup classification
//! - `ShellStore` - Per-route-key store with the freshness state machine
//! - `SingleFlight` - Shared-future registry deduplicating in-flight renders
//! - `EntryStore` / `MemoryStore` - Pluggable entry persistence

mod backend;
mod entry;
mod flight;
mod store;

pub use backend::*;
pub use entry::*;
pub use flight::*;
pub use store::*;
