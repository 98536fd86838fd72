//! Error classification logic for non-success replies.

use crate::Error;

/// Longest raw-body excerpt kept when the body carries no readable message.
const BODY_EXCERPT_CHARS: usize = 100;

/// Build the classified error for a non-success HTTP reply.
pub(crate) fn remote_error(status: u16, body: &str) -> Error {
    Error::remote(status, error_message_from_body(body))
}

/// Prefer `error.message`, then a top-level `message`, else the start of the
/// raw body.
pub(crate) fn error_message_from_body(body: &str) -> String {
    let structured = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
    match structured {
        Some(msg) => msg,
        None => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty error body".to_string()
            } else {
                trimmed.chars().take(BODY_EXCERPT_CHARS).collect()
            }
        }
    }
}
