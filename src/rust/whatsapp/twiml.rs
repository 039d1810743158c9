use axum::http::header;
use axum::response::{IntoResponse, Response};

/// Escapes text for use inside an XML element.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wraps a reply in a TwiML document.
pub fn build(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape(message)
    )
}

/// TwiML reply as an HTTP 200 `text/xml` response.
pub fn response(message: &str) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], build(message)).into_response()
}
