//! Deterministic response policy per (render outcome, request kind).

use http::header::{HeaderMap, HeaderValue};
use http::StatusCode;
use ppr_cache::CacheStatus;
use ppr_engine::encode;

use crate::request::RequestKind;

/// Response header names the gateway produces.
pub mod response_headers {
    /// Present iff the stream payload still contains postponed regions.
    pub const POSTPONED: &str = "X-NextJS-Postponed";
    /// Cache-status signal: PRERENDER, HIT or REVALIDATED.
    pub const CACHE_STATUS: &str = "x-vercel-cache";
}

/// Cache-control for prefetch streams.
pub const PREFETCH_CACHE_CONTROL: &str = "public, must-revalidate";

/// Cache-control for dynamic streams.
pub const DYNAMIC_CACHE_CONTROL: &str = "private, no-store, no-cache, max-age=0, must-revalidate";

/// A computed response: status, headers and body.
#[derive(Debug)]
pub struct GatewayResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body bytes.
    pub body: String,
}

impl GatewayResponse {
    /// A 404 response, identical for every request kind.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            body: "Not Found".to_string(),
        }
    }

    /// A 500 response for a failed render with nothing cached to serve.
    pub fn server_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: "Internal Server Error".to_string(),
        }
    }

    /// Convenience accessor for a named header's string value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Build a 200 response for the given kind.
///
/// `postponed` marks a stream payload that still contains unresolved
/// regions; `cache_status` is the shell-cache lookup classification, absent
/// for uncached (`force-dynamic`) renders.
pub fn respond(
    kind: RequestKind,
    cache_status: Option<CacheStatus>,
    postponed: bool,
    body: String,
) -> GatewayResponse {
    let mut headers = HeaderMap::new();

    let content_type = if kind.is_stream() {
        encode::STREAM_CONTENT_TYPE
    } else {
        encode::DOCUMENT_CONTENT_TYPE
    };
    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));

    match kind {
        RequestKind::Document => {}
        RequestKind::PrefetchStream => {
            headers.insert(
                http::header::CACHE_CONTROL,
                HeaderValue::from_static(PREFETCH_CACHE_CONTROL),
            );
            if postponed {
                insert(&mut headers, response_headers::POSTPONED, "1");
            }
        }
        RequestKind::DynamicStream => {
            headers.insert(
                http::header::CACHE_CONTROL,
                HeaderValue::from_static(DYNAMIC_CACHE_CONTROL),
            );
        }
    }

    if let Some(status) = cache_status {
        insert(&mut headers, response_headers::CACHE_STATUS, status.as_str());
    }

    GatewayResponse {
        status: StatusCode::OK,
        headers,
        body,
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &'static str) {
    if let Ok(name) = http::header::HeaderName::try_from(name) {
        headers.insert(name, HeaderValue::from_static(value));
    }
}
