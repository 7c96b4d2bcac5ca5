//! Secret redaction for error messages.

/// Marker appended where a message was cut.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Substrings that suggest credential material follows.
const SECRET_KEYWORDS: &[&str] = &["api_key", "token", "password", "secret"];

/// Truncate `message` at the earliest credential-looking keyword
/// (case-insensitive) and append [`REDACTION_MARKER`].
///
/// Messages without any keyword are returned unchanged.
pub fn redact_secrets(message: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with the original.
    let lowered = message.to_ascii_lowercase();

    let cut = SECRET_KEYWORDS
        .iter()
        .filter_map(|kw| lowered.find(kw))
        .min();

    match cut {
        Some(idx) => format!("{}{REDACTION_MARKER}", &message[..idx]),
        None => message.to_string(),
    }
}
