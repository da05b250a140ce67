//! Response-related utilities for Slack interactions.
//!
//! Payloads sent through an interaction's `response_url`.

use serde_json::{Value, json};

/// Create a JSON payload for an ephemeral response
///
/// Ephemeral messages are only visible to the user who triggered the shortcut.
///
/// # Examples
///
/// ```
/// use threadtldr::slack::response_builder::create_ephemeral_payload;
///
/// let payload = create_ephemeral_payload("This message is only visible to you");
/// assert_eq!(payload["response_type"], "ephemeral");
/// ```
#[must_use]
pub fn create_ephemeral_payload(text: &str) -> Value {
    json!({
        "text": text,
        "response_type": "ephemeral"
    })
}

/// Create a payload that overwrites the ephemeral message posted earlier
/// through the same `response_url`.
#[must_use]
pub fn create_replace_payload(text: &str) -> Value {
    json!({
        "text": text,
        "response_type": "ephemeral",
        "replace_original": true
    })
}
