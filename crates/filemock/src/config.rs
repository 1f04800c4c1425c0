//! Server configuration.

use std::path::PathBuf;

/// Options controlling one server instance.
///
/// The active `set` and the recording knobs are threaded through resolution
/// by argument; nothing here is ambient state.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory the mocks are served from.
    pub base_path: PathBuf,
    pub port: u16,
    pub host: String,
    /// Active mock set; mocks tagged with another set are ineligible.
    pub set: Option<String>,
    /// Glob for the not-found mocks, excluded from regular resolution.
    pub not_found: String,
    /// Additional globs excluded from resolution.
    pub ignore: Vec<String>,
    /// Log each request/response pair.
    pub logs: bool,
    /// Upstream base URL proxied to when no mock matches.
    pub proxy: Option<String>,
    /// Record proxied responses back into the mock tree.
    pub record: bool,
    /// Directory-nesting depth for recorded mocks.
    pub depth: usize,
    pub save_headers: bool,
    pub save_query_params: bool,
    /// Record into this collection instead of standalone files.
    pub collection: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            port: 3000,
            host: "localhost".to_string(),
            set: None,
            not_found: "404.*".to_string(),
            ignore: Vec::new(),
            logs: false,
            proxy: None,
            record: false,
            depth: 1,
            save_headers: false,
            save_query_params: false,
            collection: None,
        }
    }
}

impl ServerOptions {
    /// Globs excluded from the regular resolution scan.
    pub fn resolution_ignore(&self) -> Vec<String> {
        let mut ignore = vec![self.not_found.clone()];
        ignore.extend(self.ignore.iter().cloned());
        ignore
    }
}
