//! Two-phase resumable rendering for partially prerendered routes.
//!
//! This crate provides:
//! - `RouteDescriptor` / `RouteTable` - Static route classification and matching
//! - `PageTemplate` - The renderer's view of a page as an ordered node list
//! - `RenderEngine` - Phase-1 shell render and phase-2 resume
//! - `ResumeToken` - Opaque capture of postponed render state
//! - `encode` - Document and component-stream payload encoders
//!
//! # Example
//!
//! ```ignore
//! use ppr_engine::{DynamicPart, PageRegistry, PageTemplate, RenderEngine};
//!
//! let mut registry = PageRegistry::new();
//! registry.register(
//!     "/greeting/:name",
//!     PageTemplate::builder()
//!         .markup("<h1>greeting</h1>")
//!         .param_bound("<p data-page>hello {params.name}</p>")
//!         .dynamic("clock", "loading...", vec![DynamicPart::header("x-request-time")])
//!         .build(),
//! );
//! let engine = RenderEngine::new(registry);
//! ```

pub mod encode;
mod error;
mod page;
mod render;
mod route;
mod token;

pub use error::*;
pub use page::*;
pub use render::*;
pub use route::*;
pub use token::*;
