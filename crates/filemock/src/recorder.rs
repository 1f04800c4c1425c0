//! Mock recording: persist proxied upstream responses as mock files.
//!
//! A captured response is written back through the descriptor codec so the
//! repository can decode it on the next request. Plain 200/204 responses
//! keep their natural extension and raw body; anything needing status or
//! header preservation is wrapped in a JSON response envelope. The target is
//! either a standalone file laid out at the configured depth, or an entry
//! merged into a named collection.

use crate::descriptor::{MockDescriptor, MockSource};
use crate::mime;
use crate::pattern::RoutePattern;
use crate::repository::{self, COLLECTION_EXT};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Recording configuration.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Mocks directory the recording is persisted under.
    pub base_path: PathBuf,
    /// Directory-nesting depth for standalone files.
    pub depth: usize,
    /// Mock set tag applied to the recorded mock.
    pub set: Option<String>,
    /// Preserve upstream response headers (forces envelope encoding).
    pub save_headers: bool,
    /// Constrain the recorded mock by the request's query parameters.
    pub save_query_params: bool,
    /// Record into `<name>.mocks.json` instead of standalone files.
    pub collection: Option<String>,
}

/// Upstream response captured by the proxy.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedResponse {
    fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

/// Record one captured request/response pair.
///
/// Returns the path written to. Callers treat failures as log-only; the
/// client has already received the proxied response.
pub fn record(
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    response: &CapturedResponse,
    options: &RecordOptions,
) -> Result<PathBuf, anyhow::Error> {
    let (mock, content) = build_recording(method, path, query, response, options)?;

    if let Some(collection) = &options.collection {
        let key = mock.encode(0);
        let value = collection_value(&content, response);
        let path = merge_into_collection(&options.base_path, collection, key, value)?;
        info!("Recorded mock into collection {:?}", path);
        Ok(path)
    } else {
        let rel = mock.encode(options.depth);
        let path = write_mock_file(&options.base_path, &rel, &content.to_bytes())?;
        info!("Recorded mock {:?}", path);
        Ok(path)
    }
}

/// Recorded content, before layout-specific serialization.
pub enum RecordedContent {
    Text(String),
    Binary(Vec<u8>),
    Envelope(Value),
    Json(Value),
}

impl RecordedContent {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RecordedContent::Text(text) => text.clone().into_bytes(),
            RecordedContent::Binary(bytes) => bytes.clone(),
            RecordedContent::Envelope(value) | RecordedContent::Json(value) => {
                serde_json::to_string_pretty(value)
                    .unwrap_or_default()
                    .into_bytes()
            }
        }
    }
}

fn build_recording(
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    response: &CapturedResponse,
    options: &RecordOptions,
) -> Result<(MockDescriptor, RecordedContent), anyhow::Error> {
    let route: String = path
        .split('/')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let query_constraints = if options.save_query_params && !query.is_empty() {
        Some(
            query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let content_type = response.content_type().map(|ct| ct.to_string());

    // Status or header preservation cannot be expressed by the filename
    // grammar alone; those recordings become JSON envelopes.
    let needs_envelope = !matches!(response.status, 200 | 204) || options.save_headers;

    let (ext, content) = if needs_envelope {
        let textual = content_type
            .as_deref()
            .is_some_and(mime::is_textual_mime);
        let mut envelope = Map::new();
        envelope.insert("statusCode".to_string(), json!(response.status));
        if options.save_headers {
            let headers: Map<String, Value> = response
                .headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), json!(v)))
                .collect();
            envelope.insert("headers".to_string(), Value::Object(headers));
        }
        if textual {
            envelope.insert(
                "body".to_string(),
                json!(String::from_utf8_lossy(&response.body).to_string()),
            );
        } else {
            envelope.insert("body".to_string(), json!(BASE64.encode(&response.body)));
            envelope.insert("buffer".to_string(), json!(true));
        }
        (
            "json".to_string(),
            RecordedContent::Envelope(Value::Object(envelope)),
        )
    } else {
        let ext = content_type
            .as_deref()
            .and_then(mime::ext_for_mime)
            .unwrap_or_default();
        let content = if ext == "json" {
            // Re-serialize JSON bodies pretty-printed for readability.
            match serde_json::from_slice::<Value>(&response.body) {
                Ok(value) => RecordedContent::Json(value),
                Err(err) => {
                    debug!("Recorded JSON body does not parse, keeping raw bytes: {err}");
                    RecordedContent::Binary(response.body.clone())
                }
            }
        } else if content_type.as_deref().is_some_and(mime::is_textual_mime) {
            RecordedContent::Text(String::from_utf8_lossy(&response.body).to_string())
        } else {
            RecordedContent::Binary(response.body.clone())
        };
        (ext, content)
    };

    let pattern = RoutePattern::compile(&route)?;
    let mock = MockDescriptor {
        source: MockSource::File(options.base_path.clone()),
        ext,
        is_template: false,
        methods: Some(vec![method.to_lowercase()]),
        set: options.set.clone(),
        query: query_constraints,
        route,
        pattern,
    };

    Ok((mock, content))
}

/// Inline value for a collection entry, per the same textual-type rule as
/// standalone recordings.
fn collection_value(content: &RecordedContent, response: &CapturedResponse) -> Value {
    match content {
        RecordedContent::Envelope(value) | RecordedContent::Json(value) => value.clone(),
        RecordedContent::Text(text) => json!(text),
        RecordedContent::Binary(bytes) => {
            json!({
                "statusCode": response.status,
                "body": BASE64.encode(bytes),
                "buffer": true,
            })
        }
    }
}

/// Write a standalone mock file, creating parent directories as needed.
pub fn write_mock_file(base: &Path, rel: &str, content: &[u8]) -> Result<PathBuf, anyhow::Error> {
    let path = base.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Rewrite a whole collection file, entries sorted by encoded key.
pub fn write_collection(
    path: &Path,
    entries: &Map<String, Value>,
) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut contents = serde_json::to_string_pretty(&Value::Object(entries.clone()))?;
    contents.push('\n');
    std::fs::write(path, contents)?;
    Ok(())
}

fn merge_into_collection(
    base: &Path,
    collection: &str,
    key: String,
    value: Value,
) -> Result<PathBuf, anyhow::Error> {
    let file = if collection.ends_with(COLLECTION_EXT) {
        collection.to_string()
    } else {
        format!("{collection}{COLLECTION_EXT}")
    };
    let path = base.join(file);

    // serde_json's map keeps keys sorted, which gives the deterministic
    // on-disk ordering.
    let mut entries = Map::new();
    if path.exists() {
        for (existing_key, existing_value) in repository::load_collection(&path)? {
            entries.insert(existing_key, existing_value);
        }
    }
    entries.insert(key, value);
    write_collection(&path, &entries)?;
    Ok(path)
}
