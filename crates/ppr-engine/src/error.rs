//! Error types for the render engine.

use thiserror::Error;

/// Errors produced while rendering or encoding.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No page template registered for the route pattern.
    #[error("no page registered for route: {0}")]
    UnknownRoute(String),

    /// A resumption token that does not match any declared postponed region.
    ///
    /// Callers recover by performing a fresh full render instead of
    /// surfacing this to the client.
    #[error("invalid resumption token")]
    InvalidToken,

    /// Phase-1 or phase-2 render failure.
    #[error("render failed: {0}")]
    Render(String),

    /// A rendered tree could not be serialized.
    #[error("encoding failed: {0}")]
    Encoding(String),
}
