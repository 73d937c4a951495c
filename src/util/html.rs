//! HTML output helpers for destination views.

/// Escape text for embedding into HTML.
///
/// The ampersand is replaced first so already-escaped entities in the input
/// are not double-processed out of order.
pub fn sanitize(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Convert newline sequences to `<br/>` tags. Handles CRLF before the
/// individual characters so one Windows newline yields one tag.
pub fn newlines_to_breaks(text: &str) -> String {
    text.replace("\r\n", "<br/>")
        .replace('\n', "<br/>")
        .replace('\r', "<br/>")
}
