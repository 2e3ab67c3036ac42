//! Inline markup for rich-text spans.

use crate::domain::rich_text::RichText;

use super::{escape_attribute, escape_html};

/// Render each span to exactly one inline node, preserving order.
pub fn render_rich_text(spans: &[RichText]) -> Vec<String> {
    spans.iter().map(|span| render_span(span, None)).collect()
}

/// Concatenated markup for a span sequence.
pub fn rich_text_html(spans: &[RichText]) -> String {
    render_rich_text(spans).concat()
}

/// Render one span. `link_override` replaces the span's own link target.
///
/// Wrapping order is fixed: code innermost, then strong, em, s, u. A link, if
/// any, wraps everything and stands in for the outer `<span>`.
pub fn render_span(span: &RichText, link_override: Option<&str>) -> String {
    let annotations = &span.annotations;
    let mut html = escape_html(span.literal());

    if annotations.code {
        html = format!("<code class=\"inline-code\">{html}</code>");
    }
    if annotations.bold {
        html = format!("<strong>{html}</strong>");
    }
    if annotations.italic {
        html = format!("<em>{html}</em>");
    }
    if annotations.strikethrough {
        html = format!("<s>{html}</s>");
    }
    if annotations.underline {
        html = format!("<u>{html}</u>");
    }

    match link_override.or_else(|| span.link_target()) {
        Some(target) if !target.is_empty() && is_safe_href(target) => wrap_link(target, &html),
        _ => format!("<span>{html}</span>"),
    }
}

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Relative references pass. Absolute ones must use an allowed scheme, compared
/// the way browsers read it: leading controls and embedded tabs or newlines are
/// ignored.
pub(crate) fn is_safe_href(target: &str) -> bool {
    let cleaned: String = target
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    match cleaned.find(|c: char| matches!(c, ':' | '/' | '?' | '#')) {
        Some(index) if cleaned[index..].starts_with(':') => {
            let scheme = cleaned[..index].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn wrap_link(target: &str, inner: &str) -> String {
    let href = escape_attribute(target);
    if is_internal(target) {
        format!("<a href=\"{href}\" class=\"internal-link\">{inner}</a>")
    } else {
        format!(
            "<a href=\"{href}\" class=\"external-link\" target=\"_blank\" rel=\"noopener noreferrer\">{inner}</a>"
        )
    }
}

/// Root-relative paths navigate within the site. Protocol-relative `//host`
/// URLs leave it.
fn is_internal(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//")
}
