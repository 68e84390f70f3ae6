//! Request-facing layer for partially prerendered routes.
//!
//! This crate provides:
//! - `RequestKind` - Classification from stream/prefetch request headers
//! - `Gateway` - Cache-backed orchestration of render, resume and fallback
//! - `GatewayResponse` / response policy - Deterministic headers per kind
//!
//! Control flow per request: resolve the path to a route key, decide
//! between the cached shell, the fallback shell (with a detached background
//! render) or 404, then resume postponed regions with the request's dynamic
//! input as the request kind demands.

mod error;
mod gateway;
mod policy;
mod request;

pub use error::*;
pub use gateway::*;
pub use policy::*;
pub use request::*;
