//! Route descriptors, matching, and cache keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Resolved dynamic-segment values for a route instance.
pub type RouteParams = BTreeMap<String, String>;

/// Static classification of a route's render behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteDynamics {
    /// No postponed regions ever; the shell is the whole document.
    #[default]
    Static,
    /// Rendered with postponed regions resumed at request time.
    Dynamic,
    /// Dynamic input is clamped; the whole document renders static.
    ForceStatic,
    /// Never cached; both phases run synchronously on every request.
    ForceDynamic,
}

impl RouteDynamics {
    /// Whether dynamic regions are captured as postponed holes.
    pub fn postponement_enabled(&self) -> bool {
        matches!(self, Self::Dynamic | Self::ForceDynamic)
    }

    /// Whether shells for this route may be stored in the cache.
    pub fn cacheable(&self) -> bool {
        !matches!(self, Self::ForceDynamic)
    }
}

/// Build-time configuration for a single route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// Route pattern (e.g., "/products/:id").
    pub pattern: String,
    /// Render classification.
    #[serde(default)]
    pub dynamics: RouteDynamics,
    /// Whether parameter sets outside the enumerated set may be served
    /// through a fallback shell. When false, unenumerated keys are 404.
    #[serde(default = "default_true")]
    pub dynamic_params: bool,
    /// Parameter sets enumerated at build time.
    #[serde(default)]
    pub prerendered: Vec<RouteParams>,
}

fn default_true() -> bool {
    true
}

impl RouteDescriptor {
    /// Create a descriptor with default classification (static).
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            dynamics: RouteDynamics::default(),
            dynamic_params: true,
            prerendered: Vec::new(),
        }
    }

    /// Set the render classification.
    pub fn with_dynamics(mut self, dynamics: RouteDynamics) -> Self {
        self.dynamics = dynamics;
        self
    }

    /// Disallow fallback for unenumerated parameter sets.
    pub fn without_dynamic_params(mut self) -> Self {
        self.dynamic_params = false;
        self
    }

    /// Add an enumerated parameter set.
    pub fn with_prerendered(mut self, params: RouteParams) -> Self {
        self.prerendered.push(params);
        self
    }

    /// Whether the pattern carries dynamic segments.
    pub fn has_dynamic_segments(&self) -> bool {
        self.pattern.split('/').any(|s| s.starts_with(':'))
    }

    /// Match a request path against the pattern, extracting params.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let pattern_segments: Vec<&str> = segments(&self.pattern);
        let path_segments: Vec<&str> = segments(path);

        if pattern_segments.len() != path_segments.len() {
            return None;
        }

        let mut params = RouteParams::new();
        for (pat, seg) in pattern_segments.iter().zip(&path_segments) {
            if let Some(name) = pat.strip_prefix(':') {
                params.insert(name.to_string(), (*seg).to_string());
            } else if pat != seg {
                return None;
            }
        }

        Some(params)
    }

    /// Whether the given params were part of the build-time enumeration.
    ///
    /// Routes without dynamic segments are trivially enumerated.
    pub fn is_enumerated(&self, params: &RouteParams) -> bool {
        if !self.has_dynamic_segments() {
            return true;
        }
        self.prerendered.iter().any(|p| p == params)
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalized identity of a route instance: pathname plus resolved
/// dynamic-segment values. Uniquely identifies a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pathname: String,
    params: RouteParams,
}

impl RouteKey {
    /// Create a key from a pathname and resolved params.
    pub fn new(pathname: impl Into<String>, params: RouteParams) -> Self {
        Self {
            pathname: normalize(&pathname.into()),
            params,
        }
    }

    /// The normalized pathname.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// The resolved dynamic-segment values.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    /// The cache-key string for this route instance.
    pub fn cache_key(&self) -> String {
        if self.params.is_empty() {
            return self.pathname.clone();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}|{}", self.pathname, params.join("|"))
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// A request path resolved against the route table.
#[derive(Debug, Clone)]
pub struct ResolvedRoute<'a> {
    /// The owning route's descriptor.
    pub descriptor: &'a RouteDescriptor,
    /// The cache key for this route instance.
    pub key: RouteKey,
    /// Whether the key's params were enumerated at build time.
    pub enumerated: bool,
}

/// Serializable set of route descriptors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteManifest {
    /// Routes in match order; first match wins.
    pub routes: Vec<RouteDescriptor>,
}

impl RouteManifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route.
    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }
}

/// Read-only route table resolving request paths to cache keys.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    /// Build a table from a manifest.
    pub fn from_manifest(manifest: RouteManifest) -> Self {
        Self {
            routes: manifest.routes,
        }
    }

    /// Build a table from a JSON manifest.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_manifest(serde_json::from_str(json)?))
    }

    /// Resolve a request path. First matching route wins.
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute<'_>> {
        let path = normalize(path);
        for descriptor in &self.routes {
            if let Some(params) = descriptor.matches(&path) {
                let enumerated = descriptor.is_enumerated(&params);
                return Some(ResolvedRoute {
                    descriptor,
                    key: RouteKey::new(path, params),
                    enumerated,
                });
            }
        }
        None
    }

    /// The registered descriptors.
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> RouteParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_match_literal_route() {
        let route = RouteDescriptor::new("/static");
        assert_eq!(route.matches("/static"), Some(RouteParams::new()));
        assert_eq!(route.matches("/other"), None);
        assert_eq!(route.matches("/static/extra"), None);
    }

    #[test]
    fn test_match_dynamic_segments() {
        let route = RouteDescriptor::new("/nested/:slug");
        assert_eq!(route.matches("/nested/a"), Some(params(&[("slug", "a")])));
        assert_eq!(route.matches("/nested"), None);
    }

    #[test]
    fn test_enumeration() {
        let route = RouteDescriptor::new("/nested/:slug")
            .with_prerendered(params(&[("slug", "a")]))
            .with_prerendered(params(&[("slug", "b")]));
        assert!(route.is_enumerated(&params(&[("slug", "a")])));
        assert!(!route.is_enumerated(&params(&[("slug", "z")])));
    }

    #[test]
    fn test_literal_routes_trivially_enumerated() {
        let route = RouteDescriptor::new("/static");
        assert!(route.is_enumerated(&RouteParams::new()));
    }

    #[test]
    fn test_route_key_normalization() {
        let key = RouteKey::new("/nested/a/", RouteParams::new());
        assert_eq!(key.pathname(), "/nested/a");
        let root = RouteKey::new("/", RouteParams::new());
        assert_eq!(root.pathname(), "/");
    }

    #[test]
    fn test_cache_key_includes_params() {
        let key = RouteKey::new("/nested/a", params(&[("slug", "a")]));
        assert_eq!(key.cache_key(), "/nested/a|slug=a");
    }

    #[test]
    fn test_table_resolution_first_match_wins() {
        let table = RouteTable::from_manifest(
            RouteManifest::new()
                .with_route(RouteDescriptor::new("/nested/:slug"))
                .with_route(RouteDescriptor::new("/:anything")),
        );
        let resolved = table.resolve("/nested/a").unwrap();
        assert_eq!(resolved.descriptor.pattern, "/nested/:slug");
        assert_eq!(resolved.key.params(), &params(&[("slug", "a")]));
    }

    #[test]
    fn test_manifest_round_trip() {
        let manifest = RouteManifest::new().with_route(
            RouteDescriptor::new("/nested/:slug")
                .with_dynamics(RouteDynamics::Dynamic)
                .without_dynamic_params(),
        );
        let json = serde_json::to_string(&manifest).unwrap();
        let table = RouteTable::from_json(&json).unwrap();
        let route = &table.routes()[0];
        assert_eq!(route.dynamics, RouteDynamics::Dynamic);
        assert!(!route.dynamic_params);
    }
}
