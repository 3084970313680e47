//! Turning a raw HTTP response into the normalized `ApiResponse` parts

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Lowercased header names to values. Repeated headers are joined with
/// `", "` in arrival order.
pub(crate) fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

/// True for `application/json` and `+json` media types.
pub(crate) fn is_json_media_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

/// Decode a response body.
///
/// Empty bodies become `null`. A declared JSON media type must parse.
/// Without a content type the text is parsed when it is valid JSON; any
/// other declared type keeps the raw text as a JSON string.
pub(crate) fn decode_body(content_type: Option<&str>, text: &str) -> Result<Value, String> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match content_type {
        Some(ct) if is_json_media_type(ct) => {
            serde_json::from_str(text).map_err(|e| format!("invalid JSON body: {e}"))
        }
        Some(_) => Ok(Value::String(text.to_string())),
        None => Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))),
    }
}
