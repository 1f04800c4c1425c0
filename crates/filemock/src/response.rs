//! Response materialization: turn a selected mock into status, headers and
//! body bytes.
//!
//! Content resolution depends on the mock's source and extension:
//! - inline values from collections are used as-is (strings under a script
//!   key are evaluated);
//! - template and JSON files are read as text, rendered, then JSON-parsed
//!   when applicable;
//! - script files are evaluated against the request context;
//! - anything else is read as raw bytes.
//!
//! A resolved JSON object exposing `statusCode` and `body` is treated as a
//! response envelope with optional `headers` and `buffer` (base64 body).
//! Resolution failures surface as a 500 with a descriptive message.

use crate::context::RequestContext;
use crate::descriptor::{MockDescriptor, MockSource};
use crate::error::ContentError;
use crate::template;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;
use std::path::Path;

/// A fully materialized response, ready for the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDetails {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl ResponseDetails {
    /// The fixed fallback when nothing matches at all.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Some(Bytes::from_static(b"Not Found")),
        }
    }

    /// Internal error response carrying the failure message.
    pub fn internal_error(message: &str) -> Self {
        Self {
            status: 500,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Some(Bytes::from(message.to_string())),
        }
    }

    fn has_content_type(&self) -> bool {
        self.headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
    }
}

enum Resolved {
    Value(Value),
    Raw(Vec<u8>),
}

/// Materialize the response for a selected mock.
///
/// `status_override` is used by the not-found flow to force a 404 unless the
/// mock's envelope specifies its own status.
pub fn materialize(
    mock: &MockDescriptor,
    ctx: &RequestContext,
    status_override: Option<u16>,
) -> ResponseDetails {
    match resolve_content(mock, ctx) {
        Ok(resolved) => build_details(mock, resolved, status_override),
        Err(err) => ResponseDetails::internal_error(&err.to_string()),
    }
}

fn resolve_content(mock: &MockDescriptor, ctx: &RequestContext) -> Result<Resolved, ContentError> {
    if let MockSource::Inline { value, .. } = &mock.source {
        if mock.is_executable() {
            if let Value::String(source) = value {
                return Ok(Resolved::Value(eval_script(source, ctx, &mock.location())?));
            }
        }
        return Ok(Resolved::Value(value.clone()));
    }

    let path = match &mock.source {
        MockSource::File(path) => path.clone(),
        MockSource::Inline { .. } => unreachable!(),
    };

    if mock.is_template || mock.ext == "json" {
        let mut text = read_text(&path)?;
        if mock.is_template {
            text = template::render(&text, ctx);
        }
        if mock.ext == "json" {
            if text.trim().is_empty() {
                return Ok(Resolved::Value(Value::Null));
            }
            let value = serde_json::from_str(&text).map_err(|source| ContentError::Json {
                file: path.display().to_string(),
                source,
            })?;
            return Ok(Resolved::Value(value));
        }
        return Ok(Resolved::Value(Value::String(text)));
    }

    if mock.is_executable() {
        let source = read_text(&path)?;
        return Ok(Resolved::Value(eval_script(
            &source,
            ctx,
            &path.display().to_string(),
        )?));
    }

    let bytes = std::fs::read(&path).map_err(|source| ContentError::Read {
        file: path.display().to_string(),
        source,
    })?;
    Ok(Resolved::Raw(bytes))
}

fn build_details(
    mock: &MockDescriptor,
    resolved: Resolved,
    status_override: Option<u16>,
) -> ResponseDetails {
    let mut details = match resolved {
        Resolved::Raw(bytes) => ResponseDetails {
            status: status_override.unwrap_or(200),
            headers: Vec::new(),
            body: Some(Bytes::from(bytes)),
        },
        Resolved::Value(value) => match as_envelope(&value) {
            Some(envelope) => match envelope_details(mock, envelope, status_override) {
                Ok(details) => details,
                Err(err) => return ResponseDetails::internal_error(&err.to_string()),
            },
            None => {
                let default_status = if value.is_null() { 204 } else { 200 };
                ResponseDetails {
                    status: status_override.unwrap_or(default_status),
                    headers: Vec::new(),
                    body: value_body(&value),
                }
            }
        },
    };

    if !details.has_content_type() && !mock.ext.is_empty() {
        details
            .headers
            .push(("content-type".to_string(), mock.mime_type()));
    }
    details
}

struct Envelope<'a> {
    status_code: Option<u64>,
    headers: Vec<(String, String)>,
    body: &'a Value,
    buffer: bool,
}

/// An object is an envelope when it exposes both `statusCode` and `body`.
fn as_envelope(value: &Value) -> Option<Envelope<'_>> {
    let object = value.as_object()?;
    if !object.contains_key("statusCode") || !object.contains_key("body") {
        return None;
    }
    let headers = object
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Envelope {
        status_code: object.get("statusCode").and_then(Value::as_u64),
        headers,
        body: object.get("body").unwrap_or(&Value::Null),
        buffer: object
            .get("buffer")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn envelope_details(
    mock: &MockDescriptor,
    envelope: Envelope<'_>,
    status_override: Option<u16>,
) -> Result<ResponseDetails, ContentError> {
    let default_status = status_override.unwrap_or(200);
    let status = match envelope.status_code {
        Some(code) => u16::try_from(code).map_err(|_| ContentError::Body {
            file: mock.location(),
            message: format!("invalid statusCode {code}"),
        })?,
        None => default_status,
    };
    let body = if envelope.buffer {
        match envelope.body {
            Value::Null => None,
            Value::String(encoded) => Some(Bytes::from(BASE64.decode(encoded).map_err(
                |err| ContentError::Body {
                    file: mock.location(),
                    message: format!("invalid base64 body: {err}"),
                },
            )?)),
            other => value_body(other),
        }
    } else {
        value_body(envelope.body)
    };

    Ok(ResponseDetails {
        status,
        headers: envelope.headers,
        body,
    })
}

fn value_body(value: &Value) -> Option<Bytes> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Bytes::from(s.clone())),
        other => Some(Bytes::from(other.to_string())),
    }
}

fn read_text(path: &Path) -> Result<String, ContentError> {
    std::fs::read_to_string(path).map_err(|source| ContentError::Read {
        file: path.display().to_string(),
        source,
    })
}

/// Evaluate an executable mock against the request context.
///
/// A fresh engine is built per evaluation so edited scripts take effect
/// immediately, matching the repository's no-caching rule.
pub fn eval_script(source: &str, ctx: &RequestContext, location: &str) -> Result<Value, ContentError> {
    let engine = rhai::Engine::new();
    let mut scope = rhai::Scope::new();
    let request = rhai::serde::to_dynamic(ctx).map_err(|err| ContentError::Script {
        file: location.to_string(),
        message: err.to_string(),
    })?;
    scope.push_dynamic("request", request);

    let output = engine
        .eval_with_scope::<rhai::Dynamic>(&mut scope, source)
        .map_err(|err| ContentError::Script {
            file: location.to_string(),
            message: err.to_string(),
        })?;

    if output.is_unit() {
        return Ok(Value::Null);
    }
    rhai::serde::from_dynamic(&output).map_err(|err| ContentError::Script {
        file: location.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MockDescriptor;
    use std::fs;
    use tempfile::TempDir;

    fn ctx_with_query(pairs: &[(&str, &str)]) -> RequestContext {
        let mut ctx = RequestContext {
            method: "get".to_string(),
            ..Default::default()
        };
        for (k, v) in pairs {
            ctx.query.insert(k.to_string(), v.to_string());
        }
        ctx
    }

    fn file_mock(dir: &TempDir, rel: &str, content: &str) -> MockDescriptor {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        MockDescriptor::from_path(dir.path(), rel).unwrap()
    }

    fn body_text(details: &ResponseDetails) -> String {
        String::from_utf8(details.body.clone().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_template_text_mock() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "get_api#ping.txt_", "pong {{query.who}}");
        let details = materialize(&mock, &ctx_with_query(&[("who", "x")]), None);
        assert_eq!(details.status, 200);
        assert_eq!(body_text(&details), "pong x");
        assert!(details
            .headers
            .contains(&("content-type".to_string(), "text/plain".to_string())));
    }

    #[test]
    fn test_json_mock() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "get_api#hello.json", r#"{"message":"Error"}"#);
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 200);
        assert_eq!(body_text(&details), r#"{"message":"Error"}"#);
    }

    #[test]
    fn test_empty_json_is_204() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "get_nothing.json", "");
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 204);
        assert!(details.body.is_none());
    }

    #[test]
    fn test_invalid_json_is_500_with_message() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "get_bad.json", "{broken");
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 500);
        assert!(body_text(&details).contains("Error while parsing JSON"));
    }

    #[test]
    fn test_missing_file_is_500() {
        let dir = TempDir::new().unwrap();
        let mock = MockDescriptor::from_path(dir.path(), "get_gone.json").unwrap();
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 500);
        assert!(body_text(&details).contains("Error while reading mock file"));
    }

    #[test]
    fn test_envelope_with_headers() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(
            &dir,
            "get_teapot.json",
            r#"{"statusCode": 418, "headers": {"x-brew": "tea"}, "body": {"ok": false}}"#,
        );
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 418);
        assert!(details
            .headers
            .contains(&("x-brew".to_string(), "tea".to_string())));
        assert_eq!(body_text(&details), r#"{"ok":false}"#);
    }

    #[test]
    fn test_envelope_buffer_body() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(
            &dir,
            "get_blob.json",
            r#"{"statusCode": 200, "buffer": true, "body": "aGVsbG8="}"#,
        );
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.body.unwrap().as_ref(), b"hello");
    }

    #[test]
    fn test_envelope_status_out_of_range_is_500() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(
            &dir,
            "get_odd.json",
            r#"{"statusCode": 70000, "body": "x"}"#,
        );
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 500);
        assert!(body_text(&details).contains("invalid statusCode 70000"));
    }

    #[test]
    fn test_plain_object_is_not_envelope() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "get_x.json", r#"{"statusCode": 1}"#);
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        // Only statusCode without body: a literal value, not an envelope.
        assert_eq!(details.status, 200);
        assert_eq!(body_text(&details), r#"{"statusCode":1}"#);
    }

    #[test]
    fn test_script_mock() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(
            &dir,
            "get_greet.rhai",
            r#"#{ message: "hello " + request.query.who }"#,
        );
        let details = materialize(&mock, &ctx_with_query(&[("who", "rust")]), None);
        assert_eq!(details.status, 200);
        assert_eq!(body_text(&details), r#"{"message":"hello rust"}"#);
        // Script mocks render as JSON.
        assert!(details
            .headers
            .contains(&("content-type".to_string(), "application/json".to_string())));
    }

    #[test]
    fn test_script_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "get_boom.rhai", "throw \"nope\";");
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 500);
        assert!(body_text(&details).contains("Error while evaluating script"));
    }

    #[test]
    fn test_inline_value() {
        let mock = MockDescriptor::from_collection_entry(
            Path::new("api.mocks.json"),
            "get_api#hello.json",
            serde_json::json!({"hello": "world"}),
        )
        .unwrap();
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 200);
        assert_eq!(body_text(&details), r#"{"hello":"world"}"#);
    }

    #[test]
    fn test_inline_null_is_204() {
        let mock = MockDescriptor::from_collection_entry(
            Path::new("api.mocks.json"),
            "get_api#empty",
            Value::Null,
        )
        .unwrap();
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 204);
        assert!(details.body.is_none());
    }

    #[test]
    fn test_status_override_for_not_found_mocks() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "404.json", r#"{"error": "not found"}"#);
        let details = materialize(&mock, &ctx_with_query(&[]), Some(404));
        assert_eq!(details.status, 404);
    }

    #[test]
    fn test_raw_bytes_mock() {
        let dir = TempDir::new().unwrap();
        let mock = file_mock(&dir, "logo.png", "fake-image-bytes");
        let details = materialize(&mock, &ctx_with_query(&[]), None);
        assert_eq!(details.status, 200);
        assert_eq!(details.body.unwrap().as_ref(), b"fake-image-bytes");
        assert!(details
            .headers
            .contains(&("content-type".to_string(), "image/png".to_string())));
    }
}
