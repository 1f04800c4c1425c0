//! Response body templating.
//!
//! Mock files whose extension carries a trailing underscore are rendered
//! before being interpreted: `{{query.who}}`, `{{params.id}}`,
//! `{{headers.accept}}`, `{{method}}` and `{{body}}` interpolate values from
//! the request context. Unresolved references render as the empty string.

use crate::context::RequestContext;
use regex::Regex;
use std::sync::OnceLock;

static TEMPLATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn template_regex() -> &'static Regex {
    TEMPLATE_REGEX.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-\[\]]+)\s*\}\}").unwrap())
}

/// Render a template string against the request context.
pub fn render(template: &str, ctx: &RequestContext) -> String {
    template_regex()
        .replace_all(template, |caps: &regex::Captures| {
            ctx.get(&caps[1]).unwrap_or_default()
        })
        .to_string()
}
