//! Request discriminators consumed from the HTTP layer.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use ppr_engine::DynamicInput;

/// Request header names the gateway consumes.
pub mod request_headers {
    /// Stream-negotiation signal; presence means the request wants the
    /// component stream, not a document.
    pub const RSC: &str = "RSC";
    /// Prefetch signal; together with `RSC` selects the prefetch stream.
    pub const PREFETCH: &str = "Next-Router-Prefetch";
    /// Interception/context hint; accepted without altering behavior.
    pub const NEXT_URL: &str = "Next-Url";
}

/// The three request kinds the response policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Full-document navigation (no stream negotiation signal).
    Document,
    /// Stream negotiation plus prefetch signal: static payload only.
    PrefetchStream,
    /// Stream negotiation alone: fully resumed payload.
    DynamicStream,
}

impl RequestKind {
    /// Classify a request from its headers.
    pub fn classify(headers: &HeaderMap) -> Self {
        if !headers.contains_key(request_headers::RSC) {
            return Self::Document;
        }
        if headers.contains_key(request_headers::PREFETCH) {
            Self::PrefetchStream
        } else {
            Self::DynamicStream
        }
    }

    /// Whether this kind negotiated the component-stream format.
    pub fn is_stream(&self) -> bool {
        !matches!(self, Self::Document)
    }
}

/// An inbound request as the gateway sees it.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
}

impl GatewayRequest {
    /// A plain document request.
    pub fn document(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// A prefetch-stream request (`RSC: 1` + `Next-Router-Prefetch: 1`).
    pub fn prefetch(path: impl Into<String>) -> Self {
        Self::document(path)
            .with_header(request_headers::RSC, "1")
            .with_header(request_headers::PREFETCH, "1")
    }

    /// A dynamic-stream request (`RSC: 1` alone).
    pub fn dynamic_stream(path: impl Into<String>) -> Self {
        Self::document(path).with_header(request_headers::RSC, "1")
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// The request kind per the stream/prefetch signals.
    pub fn kind(&self) -> RequestKind {
        RequestKind::classify(&self.headers)
    }

    /// The request-bound input available to phase-2 resumption.
    pub fn dynamic_input(&self) -> DynamicInput {
        let mut input = DynamicInput::none();
        for (name, value) in &self.headers {
            if let Ok(value) = value.to_str() {
                input = input.with_header(name.as_str(), value);
            }
        }
        input
    }
}
