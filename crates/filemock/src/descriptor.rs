//! Mock descriptor codec.
//!
//! Converts a relative file path (or a collection entry key) into a structured
//! [`MockDescriptor`] and back. The filename grammar is:
//!
//! ```text
//! [<methods>_]<segment>[#<segment>...][$key=val[&key=val...]][__<set>][.<ext>[_]]
//! ```
//!
//! Directory separators additionally split off leading path segments, so
//! `api/get_users#active.json` and `get_api#users#active.json` describe the
//! same route. `@` in a segment marks a named route parameter (`@id` becomes
//! `:id`). A trailing underscore on the extension marks the content as a
//! template. Encoding is the exact inverse, with a depth parameter deciding
//! how many leading route segments become real directories.

use crate::mime;
use crate::pattern::RoutePattern;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static METHODS_REGEX: OnceLock<Regex> = OnceLock::new();
static PARAMS_REGEX: OnceLock<Regex> = OnceLock::new();
static SET_REGEX: OnceLock<Regex> = OnceLock::new();

fn methods_regex() -> &'static Regex {
    METHODS_REGEX.get_or_init(|| Regex::new(r"(?i)^([a-z+]+?)_").unwrap())
}

fn params_regex() -> &'static Regex {
    PARAMS_REGEX.get_or_init(|| Regex::new(r"[$?]([^.\s]+)$").unwrap())
}

fn set_regex() -> &'static Regex {
    SET_REGEX.get_or_init(|| Regex::new(r"__([\w-]+)$").unwrap())
}

/// Where a mock's content comes from.
#[derive(Debug, Clone)]
pub enum MockSource {
    /// Standalone mock file, read lazily at response time.
    File(PathBuf),
    /// Entry of a collection file, with its inline value.
    Inline {
        collection: PathBuf,
        value: Value,
    },
}

/// A single mock, decoded from a file path or a collection entry key.
#[derive(Debug, Clone)]
pub struct MockDescriptor {
    pub source: MockSource,
    /// Lower-cased file extension, empty when absent.
    pub ext: String,
    /// Content must be rendered through the template engine before use.
    pub is_template: bool,
    /// Lower-cased HTTP methods; `None` matches any method.
    pub methods: Option<Vec<String>>,
    /// Mock set tag; `None` is eligible regardless of the active set.
    pub set: Option<String>,
    /// Required query parameters (decoded); `None` matches any query.
    pub query: Option<Vec<(String, String)>>,
    /// Route pattern with `:name` parameter placeholders.
    pub route: String,
    /// Compiled matcher for `route`.
    pub pattern: RoutePattern,
}

impl PartialEq for MockDescriptor {
    /// Logical equality: everything except the source location and the
    /// compiled matcher (which is derived from `route`).
    fn eq(&self, other: &Self) -> bool {
        self.ext == other.ext
            && self.is_template == other.is_template
            && self.methods == other.methods
            && self.set == other.set
            && self.query == other.query
            && self.route == other.route
    }
}

impl MockDescriptor {
    /// Decode a standalone mock file path, relative to `base`.
    pub fn from_path(base: &Path, rel: &str) -> Result<Self, regex::Error> {
        Self::decode(MockSource::File(base.join(rel)), rel, None)
    }

    /// Decode a collection entry key with its inline value.
    pub fn from_collection_entry(
        collection: &Path,
        key: &str,
        value: Value,
    ) -> Result<Self, regex::Error> {
        Self::decode(
            MockSource::Inline {
                collection: collection.to_path_buf(),
                value: value.clone(),
            },
            key,
            Some(&value),
        )
    }

    fn decode(source: MockSource, rel: &str, inline: Option<&Value>) -> Result<Self, regex::Error> {
        let rel = rel.replace('\\', "/");
        let (dir, basename) = match rel.rfind('/') {
            Some(idx) => (&rel[..idx], &rel[idx + 1..]),
            None => ("", rel.as_str()),
        };

        // Extension, with the trailing underscore marking a template.
        let mut ext = String::new();
        let mut is_template = false;
        let mut basename = match basename.rfind('.') {
            Some(idx) if idx > 0 => {
                let raw = &basename[idx + 1..];
                is_template = raw.ends_with('_');
                ext = raw[..raw.len() - usize::from(is_template)].to_lowercase();
                basename[..idx].to_string()
            }
            _ => basename.to_string(),
        };

        // Inline values without an extension are implicitly JSON.
        if ext.is_empty() {
            if let Some(value) = inline {
                if value.is_null() || value.is_object() || value.is_array() {
                    ext = "json".to_string();
                }
            }
        }

        let mut set = None;
        if let Some(caps) = set_regex().captures(&basename) {
            set = Some(caps[1].to_string());
            basename.truncate(caps.get(0).unwrap().start());
        }

        let mut query: Option<Vec<(String, String)>> = None;
        if let Some(caps) = params_regex().captures(&basename) {
            let pairs = caps[1].to_string();
            let mut constraints: Vec<(String, String)> = Vec::new();
            for pair in pairs.split('&') {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let key = percent_decode(key);
                let value = percent_decode(value);
                match constraints.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => constraints.push((key, value)),
                }
            }
            if !constraints.is_empty() {
                query = Some(constraints);
            }
            basename.truncate(caps.get(0).unwrap().start());
        }

        let mut segments: Vec<String> = dir
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(|c| c.to_string())
            .collect();
        let mut file_segments: Vec<String> = basename
            .split('#')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        // Method prefix on the first basename segment: `get+post_...`.
        let mut methods = None;
        if let Some(first) = file_segments.first_mut() {
            if let Some(caps) = methods_regex().captures(first) {
                let tokens: Vec<String> = caps[1]
                    .split('+')
                    .filter(|m| !m.is_empty())
                    .map(|m| m.to_lowercase())
                    .collect();
                *first = first[caps.get(0).unwrap().end()..].to_string();
                if !tokens.is_empty() {
                    methods = Some(tokens);
                }
            }
        }

        segments.extend(file_segments.into_iter().filter(|c| !c.is_empty()));
        let route = segments.join("/").replace('@', ":");
        let pattern = RoutePattern::compile(&route)?;

        Ok(Self {
            source,
            ext,
            is_template,
            methods,
            set,
            query,
            route,
            pattern,
        })
    }

    /// Encode this descriptor back into a relative path string.
    ///
    /// `depth` controls how many leading route segments become directory
    /// components; the remainder is flattened into the basename with `#`.
    /// Depth has no effect on decoding, only on filesystem layout.
    pub fn encode(&self, depth: usize) -> String {
        let route = self.route.replace(':', "@");
        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        // A method prefix directly followed by a set suffix (empty basename)
        // is ambiguous to decode, so keep at least one segment in the
        // basename when both are present.
        let max_depth = if self.methods.is_some() && self.set.is_some() {
            segments.len().saturating_sub(1)
        } else {
            segments.len()
        };
        let depth = depth.min(max_depth);
        let (dirs, rest) = segments.split_at(depth);

        let mut base = String::new();
        if let Some(methods) = &self.methods {
            base.push_str(&methods.join("+"));
            base.push('_');
        }
        base.push_str(&rest.join("#"));

        if let Some(query) = &self.query {
            base.push('$');
            let pairs: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", encode_query_component(k), encode_query_component(v)))
                .collect();
            base.push_str(&pairs.join("&"));
        }

        if let Some(set) = &self.set {
            base.push_str("__");
            base.push_str(set);
        }

        if !self.ext.is_empty() {
            base.push('.');
            base.push_str(&self.ext);
            if self.is_template {
                base.push('_');
            }
        }

        if dirs.is_empty() {
            base
        } else {
            format!("{}/{}", dirs.join("/"), base)
        }
    }

    /// Content type implied by the extension, for content negotiation.
    pub fn mime_type(&self) -> String {
        mime::mime_for_ext(&self.ext)
    }

    /// Executable mocks are evaluated at render time, so their static type
    /// never constrains negotiation.
    pub fn is_executable(&self) -> bool {
        self.ext == mime::SCRIPT_EXT
    }

    /// File-backed mocks read their content lazily; inline mocks carry it.
    pub fn is_file_backed(&self) -> bool {
        matches!(self.source, MockSource::File(_))
    }

    /// Inline value for collection-sourced mocks.
    pub fn inline_value(&self) -> Option<&Value> {
        match &self.source {
            MockSource::File(_) => None,
            MockSource::Inline { value, .. } => Some(value),
        }
    }

    /// Human-readable source location for diagnostics.
    pub fn location(&self) -> String {
        match &self.source {
            MockSource::File(path) => path.display().to_string(),
            MockSource::Inline { collection, .. } => {
                format!("{}#{}", collection.display(), self.encode(0))
            }
        }
    }
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Percent-encode a query key or value for embedding in a filename.
///
/// `.` and `_` are legal in URLs but collide with the extension and set
/// markers of the filename grammar, so they are encoded as well.
fn encode_query_component(s: &str) -> String {
    urlencoding::encode(s)
        .replace('.', "%2E")
        .replace('_', "%5F")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(rel: &str) -> MockDescriptor {
        MockDescriptor::from_path(Path::new("mocks"), rel).unwrap()
    }

    #[test]
    fn test_decode_plain_file() {
        let mock = decode("api/ping.txt");
        assert_eq!(mock.route, "api/ping");
        assert_eq!(mock.ext, "txt");
        assert!(!mock.is_template);
        assert!(mock.methods.is_none());
        assert!(mock.set.is_none());
        assert!(mock.query.is_none());
    }

    #[test]
    fn test_decode_methods_and_template() {
        let mock = decode("get+post_api#ping.txt_");
        assert_eq!(mock.route, "api/ping");
        assert_eq!(mock.ext, "txt");
        assert!(mock.is_template);
        assert_eq!(
            mock.methods,
            Some(vec!["get".to_string(), "post".to_string()])
        );
    }

    #[test]
    fn test_decode_method_case_insensitive() {
        let mock = decode("GET_api#ping.json");
        assert_eq!(mock.methods, Some(vec!["get".to_string()]));
        assert_eq!(mock.ext, "json");
    }

    #[test]
    fn test_decode_set() {
        let mock = decode("get_api#hello__500.json");
        assert_eq!(mock.route, "api/hello");
        assert_eq!(mock.set.as_deref(), Some("500"));
        assert_eq!(mock.methods, Some(vec!["get".to_string()]));
    }

    #[test]
    fn test_decode_query_constraints() {
        let mock = decode("api/get_x$who=world&lang=fr.txt");
        assert_eq!(mock.route, "api/x");
        assert_eq!(
            mock.query,
            Some(vec![
                ("who".to_string(), "world".to_string()),
                ("lang".to_string(), "fr".to_string()),
            ])
        );
    }

    #[test]
    fn test_decode_query_percent_decoding() {
        let mock = decode("get_x$name=John%20Doe.json");
        assert_eq!(
            mock.query,
            Some(vec![("name".to_string(), "John Doe".to_string())])
        );
    }

    #[test]
    fn test_decode_question_mark_prefix() {
        let mock = decode("get_x?who=world.json");
        assert_eq!(
            mock.query,
            Some(vec![("who".to_string(), "world".to_string())])
        );
    }

    #[test]
    fn test_decode_route_parameters() {
        let mock = decode("api/users/get_@id.json");
        assert_eq!(mock.route, "api/users/:id");
        assert_eq!(mock.pattern.capture_names(), &["id"]);
    }

    #[test]
    fn test_decode_no_extension() {
        let mock = decode("api/ping");
        assert_eq!(mock.ext, "");
        assert_eq!(mock.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_decode_root_route() {
        let mock = decode("get_.json");
        assert_eq!(mock.route, "");
        assert_eq!(mock.methods, Some(vec!["get".to_string()]));
    }

    #[test]
    fn test_decode_collection_entry_implicit_json() {
        let mock = MockDescriptor::from_collection_entry(
            Path::new("api.mocks.json"),
            "get_api#hello",
            serde_json::json!({"hello": "world"}),
        )
        .unwrap();
        assert_eq!(mock.ext, "json");
        assert!(!mock.is_file_backed());
        assert!(mock.inline_value().is_some());
    }

    #[test]
    fn test_encode_depth_layout() {
        let mock = decode("get_api#users#active__dev.json");
        assert_eq!(mock.encode(0), "get_api#users#active__dev.json");
        assert_eq!(mock.encode(1), "api/get_users#active__dev.json");
        assert_eq!(mock.encode(2), "api/users/get_active__dev.json");
        // Depth saturates; the method/set combination pins the last segment
        // to the basename.
        assert_eq!(mock.encode(9), "api/users/get_active__dev.json");
    }

    #[test]
    fn test_round_trip_all_depths() {
        let cases = [
            "get+post_api#ping.txt_",
            "api/get_x$who=world.txt",
            "get_api#hello__500.json",
            "api/users/@id.json",
            "delete_api#items#@id__admin.json",
            "ping",
        ];
        for case in cases {
            let mock = decode(case);
            for depth in 0..4 {
                let encoded = mock.encode(depth);
                let decoded = decode(&encoded);
                assert_eq!(decoded, mock, "round trip failed for {case} at depth {depth}");
            }
        }
    }

    #[test]
    fn test_round_trip_query_with_reserved_characters() {
        let mock = MockDescriptor {
            source: MockSource::File(PathBuf::from("mocks/x")),
            ext: "json".to_string(),
            is_template: false,
            methods: Some(vec!["get".to_string()]),
            set: None,
            query: Some(vec![
                ("v".to_string(), "1.5".to_string()),
                ("tag".to_string(), "a__b".to_string()),
            ]),
            route: "api/x".to_string(),
            pattern: RoutePattern::compile("api/x").unwrap(),
        };
        let encoded = mock.encode(1);
        let decoded = decode(&encoded);
        assert_eq!(decoded, mock);
    }

    #[test]
    fn test_extension_is_lowercased() {
        let mock = decode("api/ping.TXT");
        assert_eq!(mock.ext, "txt");
    }
}
