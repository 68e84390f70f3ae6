//! Error types for the gateway.

use ppr_cache::CacheError;
use ppr_engine::EngineError;
use thiserror::Error;

/// Errors surfaced while handling a request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No route owns the path, or an unenumerated key of a
    /// fallback-disabled route was requested.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// A render backing the cache failed with no prior entry to serve.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Render or encoding failure outside the cache path.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
