//! Error types for mock content resolution.

/// Errors raised while turning a selected mock into response content.
///
/// Every variant carries the offending source location so the message can be
/// surfaced as-is in a 500 response body.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Error while reading mock file \"{file}\": {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error while parsing JSON for mock \"{file}\": {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Error while evaluating script for mock \"{file}\": {message}")]
    Script { file: String, message: String },
    #[error("Error while decoding response body for mock \"{file}\": {message}")]
    Body { file: String, message: String },
}
