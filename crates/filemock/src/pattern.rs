//! Route pattern compilation.
//!
//! A route pattern is a `/`-separated string where `:name` segments are
//! named parameters matching exactly one path segment, e.g.
//! `api/users/:id`. Patterns are compiled to an anchored regex with one
//! capture group per parameter, and the ordered list of parameter names is
//! kept alongside so captures can be zipped back into a name/value map.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static PARAM_REGEX: OnceLock<Regex> = OnceLock::new();

fn param_regex() -> &'static Regex {
    PARAM_REGEX.get_or_init(|| Regex::new(r":([A-Za-z0-9_]+)").unwrap())
}

/// A compiled route pattern with its ordered capture names.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    route: String,
    regex: Regex,
    capture_names: Vec<String>,
}

impl RoutePattern {
    /// Compile a route string into a matchable pattern.
    ///
    /// The empty route matches the root path (empty request path).
    pub fn compile(route: &str) -> Result<Self, regex::Error> {
        let mut capture_names = Vec::new();
        let mut pattern = String::from("^");
        let mut last = 0;

        for cap in param_regex().captures_iter(route) {
            let m = cap.get(0).unwrap();
            pattern.push_str(&regex::escape(&route[last..m.start()]));
            pattern.push_str("([^/]+)");
            capture_names.push(cap[1].to_string());
            last = m.end();
        }

        pattern.push_str(&regex::escape(&route[last..]));
        pattern.push('$');

        Ok(Self {
            route: route.to_string(),
            regex: Regex::new(&pattern)?,
            capture_names,
        })
    }

    /// The source route string this pattern was compiled from.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Ordered parameter names, parallel to match-group positions.
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    /// Match a request path, returning extracted parameters on success.
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let params = self
            .capture_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(params)
    }
}
