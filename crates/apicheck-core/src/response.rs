//! Normalized HTTP response shared by dispatch, validation and scenario state

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status, parsed body and headers of one dispatched call.
///
/// The status code is never interpreted here: a 404 is as much a response
/// as a 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub status: u16,
    pub body: T,
    /// Lower-case header name → value (repeated headers joined with ", ")
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16, body: T) -> Self {
        Self {
            status,
            body,
            headers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

impl ApiResponse<Value> {
    /// Deserialize the JSON body into a typed DTO.
    ///
    /// # Errors
    ///
    /// Returns error if the body does not fit `U`.
    pub fn into_typed<U: DeserializeOwned>(self) -> Result<ApiResponse<U>, serde_json::Error> {
        let body = serde_json::from_value(self.body)?;
        Ok(ApiResponse {
            status: self.status,
            body,
            headers: self.headers,
        })
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
///
/// Counts characters, not bytes, so multi-byte text is never split.
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}
