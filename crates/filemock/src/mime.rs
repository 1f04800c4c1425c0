//! MIME type mapping between mock file extensions and content types.

/// Extension used for executable mocks evaluated against the request context.
pub const SCRIPT_EXT: &str = "rhai";

/// Default type for mocks without an extension.
pub const DEFAULT_TYPE: &str = "application/octet-stream";

/// Content type implied by a mock file extension.
///
/// Script mocks render as JSON since their final shape is only known at
/// evaluation time.
pub fn mime_for_ext(ext: &str) -> String {
    if ext.is_empty() {
        return DEFAULT_TYPE.to_string();
    }
    if ext == SCRIPT_EXT {
        return "application/json".to_string();
    }
    mime_guess::from_ext(ext)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Preferred mock file extension for a response content type, if any.
pub fn ext_for_mime(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    let ext = match essence.as_str() {
        "text/plain" => "txt",
        "text/html" => "html",
        "text/css" => "css",
        "text/csv" => "csv",
        "text/markdown" => "md",
        "application/json" => "json",
        "text/javascript" | "application/javascript" => "js",
        "application/xml" | "text/xml" => "xml",
        "application/xhtml+xml" => "xhtml",
        "image/svg+xml" => "svg",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "application/pdf" => "pdf",
        "application/octet-stream" => "bin",
        _ => {
            return mime_guess::get_mime_extensions_str(&essence)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        }
    };
    Some(ext.to_string())
}

/// Whether a content type can be stored as UTF-8 text instead of base64.
pub fn is_textual_mime(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || essence.contains("json")
        || essence.contains("javascript")
        || essence.contains("xml")
        || essence.contains("svg")
}
