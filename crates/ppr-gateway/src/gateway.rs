//! Cache-backed request orchestration.

use std::sync::Arc;

use ppr_cache::{CacheError, CacheStatus, ShellEntry, ShellStore};
use ppr_engine::{
    encode, DynamicInput, EngineError, FilledRegions, RenderEngine, RouteDescriptor, RouteKey,
    RouteParams, RouteTable, Shell,
};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::policy::{respond, GatewayResponse};
use crate::request::{GatewayRequest, RequestKind};

struct Inner {
    table: RouteTable,
    engine: RenderEngine,
    store: ShellStore,
}

/// The serving front for prerendered routes.
///
/// Cheap to clone; all clones share the route table, engine and cache.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    /// Create a gateway over the in-memory shell store.
    pub fn new(table: RouteTable, engine: RenderEngine) -> Self {
        Self::with_store(table, engine, ShellStore::new())
    }

    /// Create a gateway over a custom shell store.
    pub fn with_store(table: RouteTable, engine: RenderEngine, store: ShellStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                table,
                engine,
                store,
            }),
        }
    }

    /// The underlying shell store.
    pub fn store(&self) -> &ShellStore {
        &self.inner.store
    }

    /// Resolve a request path to its route key.
    pub fn resolve_key(&self, path: &str) -> Option<RouteKey> {
        self.inner.table.resolve(path).map(|r| r.key)
    }

    /// Handle one request.
    pub async fn handle(&self, req: &GatewayRequest) -> GatewayResponse {
        match self.try_handle(req).await {
            Ok(response) => response,
            Err(GatewayError::RouteNotFound(path)) => {
                debug!(%path, "route not found");
                GatewayResponse::not_found()
            }
            Err(error) => {
                warn!(path = %req.path, %error, "request failed");
                GatewayResponse::server_error()
            }
        }
    }

    /// Out-of-band invalidation trigger. Moves the key's entry to
    /// stale-pending-revalidate; idempotent, and returns before any
    /// re-render has started.
    pub async fn invalidate(&self, path: &str) -> bool {
        match self.resolve_key(path) {
            Some(key) => self.inner.store.invalidate(&key).await,
            None => false,
        }
    }

    async fn try_handle(&self, req: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let kind = req.kind();
        let (descriptor, key, enumerated) = {
            let resolved = self
                .inner
                .table
                .resolve(&req.path)
                .ok_or_else(|| GatewayError::RouteNotFound(req.path.clone()))?;
            (
                resolved.descriptor.clone(),
                resolved.key,
                resolved.enumerated,
            )
        };

        if !enumerated && !descriptor.dynamic_params {
            // Applies to force-dynamic routes as well: an unenumerated key
            // of a fallback-disabled route is 404 under every request kind.
            return Err(GatewayError::RouteNotFound(req.path.clone()));
        }

        if !descriptor.dynamics.cacheable() {
            return self.render_uncached(&key, &descriptor, kind, req);
        }

        if enumerated || self.inner.store.contains(&key).await {
            return self.serve_shell(key, descriptor, kind, req).await;
        }

        self.serve_fallback(key, descriptor, kind, req).await
    }

    /// Serve the route-specific shell, rendering on miss or after
    /// invalidation through the store's single-flight path.
    async fn serve_shell(
        &self,
        key: RouteKey,
        descriptor: RouteDescriptor,
        kind: RequestKind,
        req: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let inner = Arc::clone(&self.inner);
        let render_key = key.clone();
        let render_descriptor = descriptor.clone();
        let (entry, status) = self
            .inner
            .store
            .get_or_render(&key, move || async move {
                build_entry(&inner, &render_key, &render_descriptor, false)
            })
            .await?;
        self.finish(&entry, Some(status), &descriptor, kind, req)
    }

    /// Serve the route's generic fallback shell and kick off a detached
    /// background render of the route-specific shell.
    async fn serve_fallback(
        &self,
        key: RouteKey,
        descriptor: RouteDescriptor,
        kind: RequestKind,
        req: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let fallback_key = RouteKey::new(descriptor.pattern.clone(), RouteParams::new());

        let inner = Arc::clone(&self.inner);
        let render_key = fallback_key.clone();
        let render_descriptor = descriptor.clone();
        let (entry, status) = self
            .inner
            .store
            .get_or_render(&fallback_key, move || async move {
                build_entry(&inner, &render_key, &render_descriptor, true)
            })
            .await?;

        // Fire-and-forget: the requester's response must not block on the
        // route-specific render, and the task outlives the request.
        let inner = Arc::clone(&self.inner);
        let background_key = key;
        let background_descriptor = descriptor.clone();
        tokio::spawn(async move {
            let render_key = background_key.clone();
            let render_descriptor = background_descriptor.clone();
            let render_inner = Arc::clone(&inner);
            let outcome = inner
                .store
                .get_or_render(&background_key, move || async move {
                    build_entry(&render_inner, &render_key, &render_descriptor, false)
                })
                .await;
            match outcome {
                Ok(_) => debug!(key = %background_key, "background shell render complete"),
                Err(error) => {
                    warn!(key = %background_key, %error, "background shell render failed")
                }
            }
        });

        self.finish(&entry, Some(status), &descriptor, kind, req)
    }

    /// Render without touching the cache, as `force-dynamic` requires.
    fn render_uncached(
        &self,
        key: &RouteKey,
        descriptor: &RouteDescriptor,
        kind: RequestKind,
        req: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let engine = &self.inner.engine;
        match kind {
            RequestKind::Document => {
                let (shell, filled) = engine.render_full(key, descriptor, &req.dynamic_input())?;
                Ok(respond(kind, None, false, encode::document(&shell, Some(&filled))?))
            }
            RequestKind::PrefetchStream => {
                let shell = engine.render_shell(key, descriptor, false)?;
                let postponed = shell.is_postponed();
                Ok(respond(kind, None, postponed, encode::stream(&shell, None)?))
            }
            RequestKind::DynamicStream => {
                let (shell, filled) = engine.render_full(key, descriptor, &req.dynamic_input())?;
                Ok(respond(kind, None, false, encode::stream(&shell, Some(&filled))?))
            }
        }
    }

    /// Build the response body for a cached entry per request kind,
    /// resuming postponed regions with the request's dynamic input.
    fn finish(
        &self,
        entry: &ShellEntry,
        status: Option<CacheStatus>,
        descriptor: &RouteDescriptor,
        kind: RequestKind,
        req: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        match kind {
            RequestKind::Document => {
                let body = if entry.is_postponed() {
                    let (shell, filled) =
                        self.resume_entry(entry, descriptor, &req.dynamic_input())?;
                    encode::document(&shell, Some(&filled))?
                } else {
                    entry.document.clone()
                };
                Ok(respond(kind, status, false, body))
            }
            RequestKind::PrefetchStream => {
                // Placeholders only; dynamic content is never prefetched.
                Ok(respond(kind, status, entry.is_postponed(), entry.stream.clone()))
            }
            RequestKind::DynamicStream => {
                let body = if entry.is_postponed() {
                    let (shell, filled) =
                        self.resume_entry(entry, descriptor, &req.dynamic_input())?;
                    encode::stream(&shell, Some(&filled))?
                } else {
                    entry.stream.clone()
                };
                Ok(respond(kind, status, false, body))
            }
        }
    }

    /// Resume a cached shell's postponed regions. An invalid token is
    /// recovered by a fresh full render instead of failing the request.
    fn resume_entry(
        &self,
        entry: &ShellEntry,
        descriptor: &RouteDescriptor,
        input: &DynamicInput,
    ) -> Result<(Shell, FilledRegions), GatewayError> {
        let token = match entry.shell.token() {
            Some(token) => token,
            None => return Ok((entry.shell.clone(), FilledRegions::new())),
        };
        match self.inner.engine.resume(token, input) {
            Ok(filled) => Ok((entry.shell.clone(), filled)),
            Err(EngineError::InvalidToken) => {
                warn!(key = %entry.shell.key(), "invalid resumption token, rendering fresh");
                Ok(self
                    .inner
                    .engine
                    .render_full(entry.shell.key(), descriptor, input)?)
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn build_entry(
    inner: &Inner,
    key: &RouteKey,
    descriptor: &RouteDescriptor,
    fallback: bool,
) -> Result<ShellEntry, CacheError> {
    let shell = inner
        .engine
        .render_shell(key, descriptor, fallback)
        .map_err(|e| CacheError::Render(e.to_string()))?;
    let document =
        encode::document(&shell, None).map_err(|e| CacheError::Render(e.to_string()))?;
    let stream = encode::stream(&shell, None).map_err(|e| CacheError::Render(e.to_string()))?;
    Ok(ShellEntry::new(shell, document, stream, fallback))
}
