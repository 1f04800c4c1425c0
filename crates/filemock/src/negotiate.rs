//! HTTP content negotiation against `Accept` preference lists.

/// One entry of a parsed `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    pub main_type: String,
    pub sub_type: String,
    pub quality: f32,
}

/// Parse an `Accept` header value into media-range entries.
///
/// A missing or empty header negotiates as `*/*`.
pub fn parse_accept(header: Option<&str>) -> Vec<AcceptEntry> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return vec![any()],
    };

    let mut entries: Vec<AcceptEntry> = header
        .split(',')
        .filter_map(|part| {
            let mut params = part.trim().split(';');
            let range = params.next()?.trim();
            let (main_type, sub_type) = range.split_once('/')?;

            let quality = params
                .filter_map(|p| p.trim().strip_prefix("q=")?.parse::<f32>().ok())
                .next()
                .unwrap_or(1.0);

            Some(AcceptEntry {
                main_type: main_type.trim().to_ascii_lowercase(),
                sub_type: sub_type.trim().to_ascii_lowercase(),
                quality,
            })
        })
        .collect();

    if entries.is_empty() {
        entries.push(any());
    }
    entries
}

/// Whether a concrete content type satisfies the preference list.
pub fn accepts(entries: &[AcceptEntry], content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    let (main_type, sub_type) = match essence.split_once('/') {
        Some(parts) => parts,
        None => return false,
    };

    entries.iter().any(|entry| {
        entry.quality > 0.0
            && (entry.main_type == "*" || entry.main_type == main_type)
            && (entry.sub_type == "*" || entry.sub_type == sub_type)
    })
}

fn any() -> AcceptEntry {
    AcceptEntry {
        main_type: "*".to_string(),
        sub_type: "*".to_string(),
        quality: 1.0,
    }
}
