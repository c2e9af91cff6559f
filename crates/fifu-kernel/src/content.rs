//! Content-type detection for payloads that arrive without a declared type.

/// Fallback for bytes nothing else recognizes.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess the media type of `data`.
///
/// Magic numbers are tried first; textual content is then classified as
/// `text/html` or `text/plain`.
pub fn detect_content_type(data: &[u8]) -> String {
    if data.is_empty() {
        return OCTET_STREAM.to_string();
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    match std::str::from_utf8(data) {
        Ok(text) if looks_like_html(text) => "text/html".to_string(),
        Ok(_) => "text/plain".to_string(),
        Err(_) => OCTET_STREAM.to_string(),
    }
}

/// Media type without parameters, lowercased: `Text/HTML; charset=utf-8`
/// becomes `text/html`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();

    head.starts_with("<!doctype html") || head.contains("<html")
}
