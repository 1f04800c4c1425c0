//! Request context passed to templates and executable mocks.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot of an incoming request, as seen by mock content.
///
/// This is the `{method, query, params, headers, body, files}` surface
/// exposed to templates and scripts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    /// Lower-cased HTTP method.
    pub method: String,
    /// Decoded query parameters; `key[]` arrays are comma-joined.
    pub query: BTreeMap<String, String>,
    /// Route parameters extracted from the matched pattern.
    pub params: BTreeMap<String, String>,
    /// Request headers, keys lower-cased.
    pub headers: BTreeMap<String, String>,
    /// Request body: parsed JSON when the content type is JSON, the raw
    /// text otherwise, `null` when empty.
    pub body: Value,
    /// Uploaded files. Multipart parsing is out of scope, so this is
    /// carried for interface compatibility and stays empty.
    pub files: Vec<Value>,
}

impl RequestContext {
    /// Look up a value by dotted path (e.g. `query.who`, `params.id`,
    /// `headers.accept`, `method`, `body`).
    pub fn get(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.splitn(2, '.').collect();
        match parts.as_slice() {
            ["method"] => Some(self.method.clone()),
            ["body"] => Some(match &self.body {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            ["query", name] => self.query.get(*name).cloned(),
            ["params", name] => self.params.get(*name).cloned(),
            ["headers", name] => self.headers.get(&name.to_lowercase()).cloned(),
            _ => None,
        }
    }
}

/// Parse a raw query string into decoded parameters.
///
/// The `key[]=v1&key[]=v2` array convention collapses into a single
/// comma-joined value under `key`.
pub fn parse_query(raw: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key);
        let value = percent_decode(value);

        if let Some(array_key) = key.strip_suffix("[]") {
            params
                .entry(array_key.to_string())
                .and_modify(|existing: &mut String| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert(value);
        } else {
            params.insert(key, value);
        }
    }
    params
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_basic() {
        let params = parse_query("who=world&lang=fr");
        assert_eq!(params.get("who"), Some(&"world".to_string()));
        assert_eq!(params.get("lang"), Some(&"fr".to_string()));
    }

    #[test]
    fn test_parse_query_percent_decoding() {
        let params = parse_query("city=New%20York");
        assert_eq!(params.get("city"), Some(&"New York".to_string()));
    }

    #[test]
    fn test_parse_query_array_convention() {
        let params = parse_query("tag[]=a&tag[]=b&tag[]=c");
        assert_eq!(params.get("tag"), Some(&"a,b,c".to_string()));
    }

    #[test]
    fn test_parse_query_empty_value() {
        let params = parse_query("flag");
        assert_eq!(params.get("flag"), Some(&String::new()));
    }

    #[test]
    fn test_context_get() {
        let mut ctx = RequestContext {
            method: "get".to_string(),
            body: serde_json::json!({"a": 1}),
            ..Default::default()
        };
        ctx.query.insert("who".to_string(), "x".to_string());
        ctx.params.insert("id".to_string(), "42".to_string());
        ctx.headers
            .insert("accept".to_string(), "text/plain".to_string());

        assert_eq!(ctx.get("method"), Some("get".to_string()));
        assert_eq!(ctx.get("query.who"), Some("x".to_string()));
        assert_eq!(ctx.get("params.id"), Some("42".to_string()));
        assert_eq!(ctx.get("headers.Accept"), Some("text/plain".to_string()));
        assert_eq!(ctx.get("body"), Some(r#"{"a":1}"#.to_string()));
        assert_eq!(ctx.get("query.missing"), None);
    }
}
