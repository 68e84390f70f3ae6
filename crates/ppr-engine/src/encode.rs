//! Payload encoders for documents and component streams.
//!
//! Both encodings preserve a stable mapping from the rendered route's
//! dynamic-segment values back into the output: the document carries an
//! unquoted `data-pathname` attribute, the stream an identifying first row.

use serde::Serialize;

use crate::error::EngineError;
use crate::render::{FilledRegions, Fragment, Shell};

/// Content type for full-document responses.
pub const DOCUMENT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Content type for component-stream responses.
pub const STREAM_CONTENT_TYPE: &str = "text/x-component";

#[derive(Serialize)]
struct StreamHead<'a> {
    pathname: &'a str,
    params: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
struct PostponedRow<'a> {
    postponed: &'a str,
    placeholder: &'a str,
}

/// Encode a complete, directly-renderable `text/html` document.
///
/// Holes without a filled value render as inert placeholders with the
/// resumption token embedded for client-side resumption; holes with a
/// filled value render their resumed content in place.
pub fn document(shell: &Shell, filled: Option<&FilledRegions>) -> Result<String, EngineError> {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n");
    // Unquoted so consumers can confirm the rendered route by substring.
    html.push_str(&format!("<body data-pathname={}>\n", shell.key().pathname()));

    let mut unresolved = false;
    for fragment in shell.fragments() {
        match fragment {
            Fragment::Html(part) => {
                html.push_str(part);
                html.push('\n');
            }
            Fragment::Hole { id, placeholder } => {
                match filled.and_then(|f| f.get(id)) {
                    Some(content) => {
                        html.push_str(&format!(
                            "<div data-resumed-id=\"{}\">{}</div>\n",
                            id, content
                        ));
                    }
                    None => {
                        unresolved = true;
                        html.push_str(&format!(
                            "<template data-postponed-id=\"{}\" hidden>{}</template>\n",
                            id, placeholder
                        ));
                    }
                }
            }
        }
    }

    if unresolved {
        if let Some(token) = shell.token() {
            html.push_str(&format!(
                "<script type=\"application/x-resume-token\" hidden>{}</script>\n",
                token.as_str()
            ));
        }
    }

    html.push_str("</body>\n</html>");
    Ok(html)
}

/// Encode the `text/x-component` stream form.
///
/// One row per fragment (`index:json`), preceded by an identifying head
/// row. A shell still carrying holes encodes them as postponed rows; a
/// filled encode replaces them with resumed content and carries no
/// postponed rows. The output never contains `<html`.
pub fn stream(shell: &Shell, filled: Option<&FilledRegions>) -> Result<String, EngineError> {
    let mut rows = Vec::with_capacity(shell.fragments().len() + 1);

    let head = StreamHead {
        pathname: shell.key().pathname(),
        params: shell.key().params(),
    };
    rows.push(format!("0:{}", to_json(&head)?));

    for (index, fragment) in shell.fragments().iter().enumerate() {
        let row = match fragment {
            Fragment::Html(part) => to_json(part)?,
            Fragment::Hole { id, placeholder } => match filled.and_then(|f| f.get(id)) {
                Some(content) => to_json(content)?,
                None => to_json(&PostponedRow {
                    postponed: id,
                    placeholder,
                })?,
            },
        };
        rows.push(format!("{}:{}", index + 1, row));
    }

    let mut out = rows.join("\n");
    out.push('\n');
    Ok(out)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string(value).map_err(|e| EngineError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{DynamicPart, PageRegistry, PageTemplate};
    use crate::render::{DynamicInput, RenderEngine};
    use crate::route::{RouteDescriptor, RouteDynamics, RouteKey, RouteParams};

    fn engine() -> RenderEngine {
        let mut registry = PageRegistry::new();
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
                        DynamicPart::header("x-test-input"),
                    ],
                )
                .build(),
        );
        RenderEngine::new(registry)
    }

    fn shell() -> (RenderEngine, Shell) {
        let engine = engine();
        let mut params = RouteParams::new();
        params.insert("slug".to_string(), "a".to_string());
        let key = RouteKey::new("/nested/a", params);
        let descriptor = RouteDescriptor::new("/nested/:slug").with_dynamics(RouteDynamics::Dynamic);
        let shell = engine.render_shell(&key, &descriptor, false).unwrap();
        (engine, shell)
    }

    #[test]
    fn test_document_identifies_route() {
        let (_, shell) = shell();
        let html = document(&shell, None).unwrap();
        assert!(html.contains("data-pathname=/nested/a"));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn test_postponed_document_embeds_placeholder_and_token() {
        let (_, shell) = shell();
        let html = document(&shell, None).unwrap();
        assert!(html.contains("data-postponed-id=\"agent\""));
        assert!(html.contains("loading..."));
        assert!(html.contains("application/x-resume-token"));
        assert!(!html.contains("needle"));
    }

    #[test]
    fn test_filled_document_contains_resumed_content() {
        let (engine, shell) = shell();
        let input = DynamicInput::none().with_header("x-test-input", "abc123");
        let filled = engine.resume(shell.token().unwrap(), &input).unwrap();
        let html = document(&shell, Some(&filled)).unwrap();
        assert!(html.contains("needle:abc123"));
        assert!(!html.contains("data-postponed-id"));
        assert!(!html.contains("application/x-resume-token"));
    }

    #[test]
    fn test_stream_shape() {
        let (_, shell) = shell();
        let out = stream(&shell, None).unwrap();
        assert!(out.starts_with("0:{"));
        assert!(out.contains(':'));
        assert!(!out.contains("<html"));
        assert!(out.contains("\"pathname\":\"/nested/a\""));
    }

    #[test]
    fn test_postponed_stream_carries_placeholder_not_content() {
        let (_, shell) = shell();
        let out = stream(&shell, None).unwrap();
        assert!(out.contains("\"postponed\":\"agent\""));
        assert!(!out.contains("needle"));
    }

    #[test]
    fn test_filled_stream_has_no_postponed_rows() {
        let (engine, shell) = shell();
        let input = DynamicInput::none().with_header("x-test-input", "abc123");
        let filled = engine.resume(shell.token().unwrap(), &input).unwrap();
        let out = stream(&shell, Some(&filled)).unwrap();
        assert!(out.contains("needle:abc123"));
        assert!(!out.contains("\"postponed\""));
    }
}
