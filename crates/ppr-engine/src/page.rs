//! Page templates: the renderer's black-box view of a component tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A piece of dynamic output recorded for phase-2 resumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DynamicPart {
    /// Literal emitted only once the region is resumed.
    Literal(String),
    /// Echo of a request header (e.g. `X-Test-Input`).
    Header(String),
}

impl DynamicPart {
    /// Create a literal part.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Create a header-echo part. Header names are matched case-insensitively.
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header(name.into().to_ascii_lowercase())
    }
}

/// A region whose output requires request-bound input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRegion {
    /// Stable region identifier.
    pub id: String,
    /// Inert placeholder shown while the region is postponed.
    pub placeholder: String,
    /// Recorded dynamic output, evaluated at resume time.
    pub parts: Vec<DynamicPart>,
}

impl DynamicRegion {
    /// Create a new dynamic region.
    pub fn new(
        id: impl Into<String>,
        placeholder: impl Into<String>,
        parts: Vec<DynamicPart>,
    ) -> Self {
        Self {
            id: id.into(),
            placeholder: placeholder.into(),
            parts,
        }
    }
}

/// One node of a page template.
#[derive(Debug, Clone)]
pub enum PageNode {
    /// Static markup, identical for every key of the route.
    Markup(String),
    /// Markup resolved from route params. Fallback shells replace it with a
    /// hidden placeholder because the params are not yet known.
    ParamBound(String),
    /// A region needing request-bound input.
    Dynamic(DynamicRegion),
}

/// An ordered list of nodes describing a page.
#[derive(Debug, Clone, Default)]
pub struct PageTemplate {
    /// Nodes in document order.
    pub nodes: Vec<PageNode>,
}

impl PageTemplate {
    /// Create a template using the builder.
    pub fn builder() -> PageTemplateBuilder {
        PageTemplateBuilder::default()
    }

    /// Iterate over the declared dynamic regions.
    pub fn dynamic_regions(&self) -> impl Iterator<Item = &DynamicRegion> {
        self.nodes.iter().filter_map(|n| match n {
            PageNode::Dynamic(region) => Some(region),
            _ => None,
        })
    }

    /// Whether the template declares any dynamic regions.
    pub fn has_dynamic_regions(&self) -> bool {
        self.dynamic_regions().next().is_some()
    }
}

/// Builder for ergonomic template definition.
#[derive(Debug, Default)]
pub struct PageTemplateBuilder {
    nodes: Vec<PageNode>,
}

impl PageTemplateBuilder {
    /// Append static markup.
    pub fn markup(mut self, html: impl Into<String>) -> Self {
        self.nodes.push(PageNode::Markup(html.into()));
        self
    }

    /// Append param-bound markup. `{params.name}` and `{pathname}` are
    /// substituted from the route key at render time.
    pub fn param_bound(mut self, html: impl Into<String>) -> Self {
        self.nodes.push(PageNode::ParamBound(html.into()));
        self
    }

    /// Append a dynamic region.
    pub fn dynamic(
        mut self,
        id: impl Into<String>,
        placeholder: impl Into<String>,
        parts: Vec<DynamicPart>,
    ) -> Self {
        self.nodes
            .push(PageNode::Dynamic(DynamicRegion::new(id, placeholder, parts)));
        self
    }

    /// Build the template.
    pub fn build(self) -> PageTemplate {
        PageTemplate { nodes: self.nodes }
    }
}

/// Registry mapping route patterns to page templates.
#[derive(Debug, Default)]
pub struct PageRegistry {
    pages: HashMap<String, PageTemplate>,
}

impl PageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template for a route pattern.
    pub fn register(&mut self, pattern: impl Into<String>, template: PageTemplate) {
        self.pages.insert(pattern.into(), template);
    }

    /// Look up the template for a pattern.
    pub fn get(&self, pattern: &str) -> Option<&PageTemplate> {
        self.pages.get(pattern)
    }
}
