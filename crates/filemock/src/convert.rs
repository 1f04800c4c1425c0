//! Conversion between standalone mock files and single-file collections.
//!
//! Both directions round-trip through the descriptor codec: file paths are
//! decoded, re-encoded at depth 0 as collection keys, and collection keys are
//! re-encoded at the requested depth as file paths. Per-entry failures are
//! logged and skipped; the batch continues.

use crate::descriptor::{MockDescriptor, MockSource};
use crate::mime;
use crate::recorder::{write_collection, write_mock_file};
use crate::repository::{self, COLLECTION_EXT};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{error, info};

/// Convert between mock representations.
///
/// If `input` matches a single collection, it is split into standalone files
/// under the `output` directory at `depth`. If it matches standalone files,
/// they are gathered into the collection file `output` (the `.mocks.json`
/// suffix is appended when missing). Mixing both, or matching more than one
/// collection, is an error.
pub fn convert(input: &str, output: &str, ignore: Option<&str>, depth: usize) -> Result<(), anyhow::Error> {
    let input_path = Path::new(input);
    let (base, include) = if input_path.is_dir() {
        (input_path.to_path_buf(), "**/*".to_string())
    } else if input_path.is_file() {
        let base = input_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let name = input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.to_string());
        (base, name)
    } else {
        (Path::new(".").to_path_buf(), input.to_string())
    };
    let ignore: Vec<String> = ignore.map(|glob| glob.to_string()).into_iter().collect();

    let files = repository::scan_files(&base, &ignore, &[include])?;
    let (collections, files): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|file| file.ends_with(COLLECTION_EXT));

    if files.is_empty() && collections.is_empty() {
        anyhow::bail!("No files to convert");
    }
    if files.is_empty() {
        if collections.len() > 1 {
            anyhow::bail!("Only 1 mock collection can be converted at a time");
        }
        info!("Converting mock collection {}...", collections[0]);
        return collection_to_files(&base.join(&collections[0]), Path::new(output), depth);
    }
    if !collections.is_empty() {
        anyhow::bail!("Cannot mix mock files and collections in one conversion");
    }

    info!("Converting mocks to collection...");
    files_to_collection(&base, &files, output)
}

/// Gather standalone mock files into one collection.
pub fn files_to_collection(
    base: &Path,
    files: &[String],
    output: &str,
) -> Result<(), anyhow::Error> {
    let mut entries = Map::new();

    for file in files {
        let mock = match MockDescriptor::from_path(base, file) {
            Ok(mock) => mock,
            Err(err) => {
                error!("Error while converting \"{file}\": invalid route pattern: {err}");
                continue;
            }
        };
        match file_entry_value(&mock) {
            Ok(value) => {
                entries.insert(mock.encode(0), value);
            }
            Err(err) => error!("Error while converting \"{file}\": {err}"),
        }
    }

    let output = if output.ends_with(COLLECTION_EXT) {
        output.to_string()
    } else {
        format!("{output}{COLLECTION_EXT}")
    };
    write_collection(Path::new(&output), &entries)?;
    info!("Wrote collection {output} ({} mocks)", entries.len());
    Ok(())
}

/// Split one collection into standalone files at the requested depth.
pub fn collection_to_files(
    collection: &Path,
    output: &Path,
    depth: usize,
) -> Result<(), anyhow::Error> {
    let entries = repository::load_collection(collection)?;
    let mut written = 0usize;

    for (key, value) in entries {
        let mock = match MockDescriptor::from_collection_entry(collection, &key, value.clone()) {
            Ok(mock) => mock,
            Err(err) => {
                error!("Error while converting \"{key}\": invalid route pattern: {err}");
                continue;
            }
        };
        let rel = mock.encode(depth);
        let content = entry_file_content(&mock, &value);
        match write_mock_file(output, &rel, &content) {
            Ok(_) => written += 1,
            Err(err) => error!("Error while converting \"{key}\": {err}"),
        }
    }

    info!("Wrote {written} mock files under {:?}", output);
    Ok(())
}

/// Resolve a standalone file's content eagerly into a collection value.
fn file_entry_value(mock: &MockDescriptor) -> Result<Value, anyhow::Error> {
    let path = match &mock.source {
        MockSource::File(path) => path.clone(),
        MockSource::Inline { .. } => unreachable!("standalone conversion"),
    };

    // JSON files embed as structure; templates stay text even when JSON.
    if mock.ext == "json" && !mock.is_template {
        let text = std::fs::read_to_string(&path)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&text)?);
    }

    // Scripts serialize as source text; so does anything with a textual type.
    if mock.is_executable()
        || mock.is_template
        || mime::is_textual_mime(&mock.mime_type())
    {
        return Ok(json!(std::fs::read_to_string(&path)?));
    }

    let bytes = std::fs::read(&path)?;
    Ok(json!({
        "statusCode": 200,
        "body": BASE64.encode(bytes),
        "buffer": true,
    }))
}

/// File content for one collection entry.
fn entry_file_content(mock: &MockDescriptor, value: &Value) -> Vec<u8> {
    match value {
        Value::Null => Vec::new(),
        Value::String(text) => text.clone().into_bytes(),
        Value::Object(object)
            if mock.ext != "json"
                && object.get("buffer").and_then(Value::as_bool) == Some(true) =>
        {
            // A binary envelope under a non-JSON key unwraps back to raw
            // bytes, restoring what files_to_collection encoded.
            object
                .get("body")
                .and_then(Value::as_str)
                .and_then(|body| BASE64.decode(body).ok())
                .unwrap_or_default()
        }
        other => {
            let mut text = serde_json::to_string_pretty(other).unwrap_or_default();
            text.push('\n');
            text.into_bytes()
        }
    }
}
