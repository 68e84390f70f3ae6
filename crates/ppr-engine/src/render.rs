//! Two-phase resumable renderer.
//!
//! Phase 1 (`render_shell`) uses only statically-known input: dynamic
//! regions are intercepted and captured as postponed holes with a resumption
//! token instead of being evaluated. Phase 2 (`resume`) evaluates exactly
//! those regions with request-bound input; it never re-renders anything the
//! shell already resolved.

use std::collections::{BTreeMap, HashSet};

use crate::error::EngineError;
use crate::page::{DynamicPart, PageNode, PageRegistry};
use crate::route::{RouteDescriptor, RouteDynamics, RouteKey};
use crate::token::{RecordedRegion, ResumeToken, TokenPayload};

/// Request-bound input available to phase-2 resumption.
#[derive(Debug, Clone, Default)]
pub struct DynamicInput {
    headers: BTreeMap<String, String>,
}

impl DynamicInput {
    /// Empty input, as used when dynamic evaluation is clamped.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a request header. Names are matched case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }
}

/// One piece of phase-1 render output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Resolved HTML.
    Html(String),
    /// A postponed hole awaiting phase-2 resumption.
    Hole {
        /// Region identifier.
        id: String,
        /// Inert placeholder for the static shell.
        placeholder: String,
    },
}

/// Resumed region output, keyed by region id.
pub type FilledRegions = BTreeMap<String, String>;

/// Phase-1 render output: resolved fragments plus postponed holes.
#[derive(Debug, Clone)]
pub struct Shell {
    key: RouteKey,
    fragments: Vec<Fragment>,
    token: Option<ResumeToken>,
    fallback: bool,
}

impl Shell {
    /// The route instance this shell was rendered for.
    pub fn key(&self) -> &RouteKey {
        &self.key
    }

    /// Fragments in document order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The resumption token, present iff the shell has postponed holes.
    pub fn token(&self) -> Option<&ResumeToken> {
        self.token.as_ref()
    }

    /// Whether any region is still postponed.
    pub fn is_postponed(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| matches!(f, Fragment::Hole { .. }))
    }

    /// Whether this is a generic fallback shell.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// Markup emitted in place of param-bound content in fallback shells.
const FALLBACK_PLACEHOLDER: &str = "<div data-fallback hidden></div>";

/// The two-phase renderer.
#[derive(Debug)]
pub struct RenderEngine {
    registry: PageRegistry,
}

impl RenderEngine {
    /// Create an engine over a page registry.
    pub fn new(registry: PageRegistry) -> Self {
        Self { registry }
    }

    /// Phase 1: render the shell for a route instance.
    ///
    /// Uses only statically-known input. Dynamic regions become postponed
    /// holes unless the descriptor is `force-static`, in which case their
    /// evaluation is clamped (request input resolves to nothing) and the
    /// whole document renders static. A fallback render replaces param-bound
    /// markup with a hidden placeholder.
    pub fn render_shell(
        &self,
        key: &RouteKey,
        descriptor: &RouteDescriptor,
        fallback: bool,
    ) -> Result<Shell, EngineError> {
        let page = self
            .registry
            .get(&descriptor.pattern)
            .ok_or_else(|| EngineError::UnknownRoute(descriptor.pattern.clone()))?;

        let mut fragments = Vec::with_capacity(page.nodes.len());
        let mut recorded = Vec::new();

        for node in &page.nodes {
            match node {
                PageNode::Markup(html) => {
                    fragments.push(Fragment::Html(resolve_markup(html, key)));
                }
                PageNode::ParamBound(html) => {
                    if fallback {
                        fragments.push(Fragment::Html(FALLBACK_PLACEHOLDER.to_string()));
                    } else {
                        fragments.push(Fragment::Html(resolve_markup(html, key)));
                    }
                }
                PageNode::Dynamic(region) => {
                    if descriptor.dynamics == RouteDynamics::Static {
                        return Err(EngineError::Render(format!(
                            "route {} is classified static but declares dynamic region '{}'",
                            descriptor.pattern, region.id
                        )));
                    }
                    if descriptor.dynamics.postponement_enabled() {
                        fragments.push(Fragment::Hole {
                            id: region.id.clone(),
                            placeholder: region.placeholder.clone(),
                        });
                        recorded.push(RecordedRegion {
                            id: region.id.clone(),
                            parts: region.parts.clone(),
                        });
                    } else {
                        // force-static: clamped evaluation, no hole.
                        fragments.push(Fragment::Html(evaluate_parts(
                            &region.parts,
                            &DynamicInput::none(),
                        )));
                    }
                }
            }
        }

        if descriptor.dynamics == RouteDynamics::Dynamic && recorded.is_empty() {
            return Err(EngineError::Render(format!(
                "route {} is classified dynamic but rendered no postponed regions",
                descriptor.pattern
            )));
        }

        let token = if recorded.is_empty() {
            None
        } else {
            Some(ResumeToken::seal(&TokenPayload {
                route: descriptor.pattern.clone(),
                regions: recorded,
            })?)
        };

        Ok(Shell {
            key: key.clone(),
            fragments,
            token,
            fallback,
        })
    }

    /// Phase 2: resume the postponed regions captured in a token.
    ///
    /// Deterministic and idempotent for a given (token, input) pair. Fails
    /// with `InvalidToken` when the token does not decode or names a region
    /// the route never declared.
    pub fn resume(
        &self,
        token: &ResumeToken,
        input: &DynamicInput,
    ) -> Result<FilledRegions, EngineError> {
        let payload = token.open()?;
        let page = self
            .registry
            .get(&payload.route)
            .ok_or(EngineError::InvalidToken)?;

        let declared: HashSet<&str> = page.dynamic_regions().map(|r| r.id.as_str()).collect();
        for region in &payload.regions {
            if !declared.contains(region.id.as_str()) {
                return Err(EngineError::InvalidToken);
            }
        }

        Ok(payload
            .regions
            .iter()
            .map(|r| (r.id.clone(), evaluate_parts(&r.parts, input)))
            .collect())
    }

    /// Run both phases synchronously, as `force-dynamic` routes and
    /// invalid-token recovery require.
    pub fn render_full(
        &self,
        key: &RouteKey,
        descriptor: &RouteDescriptor,
        input: &DynamicInput,
    ) -> Result<(Shell, FilledRegions), EngineError> {
        let shell = self.render_shell(key, descriptor, false)?;
        let filled = match shell.token() {
            Some(token) => self.resume(token, input)?,
            None => FilledRegions::new(),
        };
        Ok((shell, filled))
    }
}

fn evaluate_parts(parts: &[DynamicPart], input: &DynamicInput) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            DynamicPart::Literal(text) => out.push_str(text),
            DynamicPart::Header(name) => {
                if let Some(value) = input.header(name) {
                    out.push_str(value);
                }
            }
        }
    }
    out
}

fn resolve_markup(template: &str, key: &RouteKey) -> String {
    let mut out = template.replace("{pathname}", key.pathname());
    for (name, value) in key.params() {
        out = out.replace(&format!("{{params.{}}}", name), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageRegistry, PageTemplate};
    use crate::route::RouteParams;

    fn engine() -> RenderEngine {
        let mut registry = PageRegistry::new();
        registry.register(
            "/static",
            PageTemplate::builder().markup("<h1>static page</h1>").build(),
        );
        registry.register(
            "/nested/:slug",
            PageTemplate::builder()
                .markup("<h1>nested</h1>")
                .param_bound("<section data-page>slug {params.slug}</section>")
                .dynamic(
                    "agent",
                    "loading...",
                    vec![
                        DynamicPart::literal("needle:"),
                        DynamicPart::header("X-Test-Input"),
                    ],
                )
                .build(),
        );
        registry.register(
            "/pinned",
            PageTemplate::builder()
                .markup("<h1>pinned</h1>")
                .dynamic(
                    "agent",
                    "loading...",
                    vec![
                        DynamicPart::literal("needle:"),
                        DynamicPart::header("X-Test-Input"),
                    ],
                )
                .build(),
        );
        RenderEngine::new(registry)
    }

    fn nested_key(slug: &str) -> RouteKey {
        let mut params = RouteParams::new();
        params.insert("slug".to_string(), slug.to_string());
        RouteKey::new(format!("/nested/{}", slug), params)
    }

    fn nested_descriptor() -> RouteDescriptor {
        RouteDescriptor::new("/nested/:slug").with_dynamics(RouteDynamics::Dynamic)
    }

    #[test]
    fn test_static_shell_has_no_holes() {
        let engine = engine();
        let key = RouteKey::new("/static", RouteParams::new());
        let shell = engine
            .render_shell(&key, &RouteDescriptor::new("/static"), false)
            .unwrap();
        assert!(!shell.is_postponed());
        assert!(shell.token().is_none());
    }

    #[test]
    fn test_dynamic_shell_postpones_regions() {
        let engine = engine();
        let shell = engine
            .render_shell(&nested_key("a"), &nested_descriptor(), false)
            .unwrap();
        assert!(shell.is_postponed());
        assert!(shell.token().is_some());
        assert!(shell
            .fragments()
            .iter()
            .any(|f| matches!(f, Fragment::Hole { id, .. } if id == "agent")));
    }

    #[test]
    fn test_token_is_pure_function_of_shell_render() {
        let engine = engine();
        let a = engine
            .render_shell(&nested_key("a"), &nested_descriptor(), false)
            .unwrap();
        let b = engine
            .render_shell(&nested_key("b"), &nested_descriptor(), false)
            .unwrap();
        // Same recorded state regardless of which key triggered the render.
        assert_eq!(a.token(), b.token());
    }

    #[test]
    fn test_resume_reflects_request_input() {
        let engine = engine();
        let shell = engine
            .render_shell(&nested_key("a"), &nested_descriptor(), false)
            .unwrap();
        let input = DynamicInput::none().with_header("X-Test-Input", "abc123");
        let filled = engine.resume(shell.token().unwrap(), &input).unwrap();
        assert_eq!(filled.get("agent").unwrap(), "needle:abc123");
    }

    #[test]
    fn test_resume_is_idempotent() {
        let engine = engine();
        let shell = engine
            .render_shell(&nested_key("a"), &nested_descriptor(), false)
            .unwrap();
        let input = DynamicInput::none().with_header("x-test-input", "same");
        let first = engine.resume(shell.token().unwrap(), &input).unwrap();
        let second = engine.resume(shell.token().unwrap(), &input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_inputs_resume_independently() {
        let engine = engine();
        let shell = engine
            .render_shell(&nested_key("a"), &nested_descriptor(), false)
            .unwrap();
        let token = shell.token().unwrap();
        let one = engine
            .resume(token, &DynamicInput::none().with_header("x-test-input", "one"))
            .unwrap();
        let two = engine
            .resume(token, &DynamicInput::none().with_header("x-test-input", "two"))
            .unwrap();
        assert_eq!(one.get("agent").unwrap(), "needle:one");
        assert_eq!(two.get("agent").unwrap(), "needle:two");
    }

    #[test]
    fn test_force_static_clamps_dynamic_input() {
        let engine = engine();
        let key = RouteKey::new("/pinned", RouteParams::new());
        let descriptor =
            RouteDescriptor::new("/pinned").with_dynamics(RouteDynamics::ForceStatic);
        let shell = engine.render_shell(&key, &descriptor, false).unwrap();
        assert!(!shell.is_postponed());
        assert!(shell.token().is_none());
        // The literal renders; the clamped header echo does not.
        assert!(shell
            .fragments()
            .iter()
            .any(|f| matches!(f, Fragment::Html(h) if h == "needle:")));
    }

    #[test]
    fn test_fallback_shell_hides_param_bound_markup() {
        let engine = engine();
        let key = RouteKey::new("/nested/:slug", RouteParams::new());
        let shell = engine
            .render_shell(&key, &nested_descriptor(), true)
            .unwrap();
        assert!(shell.is_fallback());
        let html: Vec<&Fragment> = shell.fragments().iter().collect();
        assert!(html
            .iter()
            .any(|f| matches!(f, Fragment::Html(h) if h.contains("data-fallback"))));
        assert!(!html
            .iter()
            .any(|f| matches!(f, Fragment::Html(h) if h.contains("data-page"))));
    }

    #[test]
    fn test_foreign_token_is_rejected() {
        let engine = engine();
        let foreign = ResumeToken::seal(&TokenPayload {
            route: "/nested/:slug".to_string(),
            regions: vec![RecordedRegion {
                id: "undeclared".to_string(),
                parts: vec![],
            }],
        })
        .unwrap();
        let result = engine.resume(&foreign, &DynamicInput::none());
        assert!(matches!(result, Err(EngineError::InvalidToken)));
    }

    #[test]
    fn test_static_route_with_dynamic_region_is_an_error() {
        let engine = engine();
        let key = RouteKey::new("/pinned", RouteParams::new());
        let descriptor = RouteDescriptor::new("/pinned");
        assert!(matches!(
            engine.render_shell(&key, &descriptor, false),
            Err(EngineError::Render(_))
        ));
    }

    #[test]
    fn test_render_full_runs_both_phases() {
        let engine = engine();
        let descriptor = nested_descriptor();
        let input = DynamicInput::none().with_header("x-test-input", "live");
        let (shell, filled) = engine
            .render_full(&nested_key("a"), &descriptor, &input)
            .unwrap();
        assert!(shell.is_postponed());
        assert_eq!(filled.get("agent").unwrap(), "needle:live");
    }
}
