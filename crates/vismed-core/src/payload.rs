// Event payload shaping
//
// Payloads are opaque JSON documents produced by the upstream automation
// flow. The only recognized shape is an optional `output` field carrying
// human-readable text, either directly as a string or as an array of
// sub-objects each carrying their own `output` string. Array-shaped output
// is flattened to one newline-joined string before broadcast; everything
// else passes through untouched.

use serde_json::Value;

/// Number of characters of output text used as the dedup signature.
pub const SIGNATURE_CHARS: usize = 100;

/// Extract the human-readable text of a payload, if it has any.
///
/// A string `output` is returned as-is. An array `output` contributes each
/// element's own `output` string (or the element serialized as JSON when it
/// carries none), joined with newlines. Any other shape has no text.
pub fn output_text(payload: &Value) -> Option<String> {
    match payload.get("output") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| match item.get("output") {
                    Some(Value::String(text)) => text.clone(),
                    _ => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Rewrite a payload into the exact document broadcast to subscribers.
///
/// Only array-shaped `output` is touched: it is replaced by its joined text
/// so every subscriber sees a single string field. Unrecognized payloads
/// are broadcast as-is.
pub fn normalize(mut payload: Value) -> Value {
    if matches!(payload.get("output"), Some(Value::Array(_))) {
        let text = output_text(&payload).unwrap_or_default();
        if let Some(object) = payload.as_object_mut() {
            object.insert("output".to_string(), Value::String(text));
        }
    }
    payload
}

/// Cheap content signature used to suppress near-duplicate buffered
/// publishes: the first [`SIGNATURE_CHARS`] characters of the payload's
/// output text, or the empty string when it has none.
pub fn dedup_signature(payload: &Value) -> String {
    output_text(payload)
        .map(|text| text.chars().take(SIGNATURE_CHARS).collect())
        .unwrap_or_default()
}
