//! Lenient JSON extraction from model output

use serde_json::{Map, Value};

/// Locate the JSON object inside `raw`, unwrapping a fenced code block if present
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let text = raw.trim();

    if let Some(inner) = fenced_block(text) {
        if inner.starts_with('{') {
            return Some(inner);
        }
    }

    if text.starts_with('{') {
        return Some(text);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the first JSON object in `raw`
pub fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    let candidate = extract_json_object(raw)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];

    // Skip the language tag (```json)
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];

    let close = body.find("```")?;
    Some(body[..close].trim())
}
