//! Per-scenario state passed between test steps
//!
//! One [`ScenarioState`] belongs to one scenario run. The runner creates it
//! when the scenario starts and drops it when the scenario ends; there is no
//! global store, so concurrent scenarios cannot see each other's data.

use std::any::{Any, type_name};
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::response::ApiResponse;

/// Last response plus arbitrary keyed data for one scenario.
#[derive(Default)]
pub struct ScenarioState {
    last_response: Option<ApiResponse<Value>>,
    data: HashMap<String, Box<dyn Any + Send>>,
}

impl std::fmt::Debug for ScenarioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.data.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("ScenarioState")
            .field("last_response", &self.last_response.as_ref().map(|r| r.status))
            .field("keys", &keys)
            .finish()
    }
}

impl ScenarioState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the last response.
    pub fn store_response(&mut self, response: ApiResponse<Value>) {
        self.last_response = Some(response);
    }

    /// Borrow the last response.
    pub fn last_response(&self) -> Result<&ApiResponse<Value>, StateError> {
        self.last_response.as_ref().ok_or(StateError::NoResponse)
    }

    /// Copy of the last response with its body decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NoResponse`] if nothing was stored, or
    /// [`StateError::Decode`] if the body does not fit `T`.
    pub fn retrieve_response<T: DeserializeOwned>(&self) -> Result<ApiResponse<T>, StateError> {
        self.last_response()?
            .clone()
            .into_typed()
            .map_err(|e| StateError::Decode(e.to_string()))
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn store_data<V: Any + Send>(
        &mut self,
        key: impl Into<String>,
        value: V,
    ) -> Result<(), StateError> {
        let key = key.into();
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }
        self.data.insert(key, Box::new(value));
        Ok(())
    }

    /// Borrow the value stored under `key` as a `V`.
    pub fn retrieve_data<V: Any>(&self, key: &str) -> Result<&V, StateError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| StateError::MissingKey(key.to_string()))?;
        value
            .downcast_ref::<V>()
            .ok_or_else(|| StateError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<V>(),
            })
    }

    /// Remove one key. Returns whether it was present.
    pub fn clear_data(&mut self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Remove all keyed data. The last response is kept.
    pub fn clear_all_data(&mut self) {
        self.data.clear();
    }

    pub fn contains_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("No response stored")]
    NoResponse,
    #[error("Storage key must be a non-empty string")]
    EmptyKey,
    #[error("No data found for key: {0}")]
    MissingKey(String),
    #[error("Data for key '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("Stored response does not fit the requested type: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Elixir {
        id: String,
        name: String,
    }

    fn assert_send<T: Send>() {}

    // ── responses ──

    #[test]
    fn retrieve_response_before_store_fails() {
        let state = ScenarioState::new();
        let err = state.retrieve_response::<Value>().unwrap_err();
        assert_eq!(err, StateError::NoResponse);
        insta::assert_snapshot!(err.to_string(), @"No response stored");
    }

    #[test]
    fn store_then_retrieve_response() {
        let mut state = ScenarioState::new();
        state.store_response(ApiResponse::new(200, json!([{"id": "1", "name": "Felix Felicis"}])));

        let typed = state.retrieve_response::<Vec<Elixir>>().unwrap();
        assert_eq!(typed.status, 200);
        assert_eq!(typed.body[0].name, "Felix Felicis");

        // Retrieval doesn't consume
        assert_eq!(state.last_response().unwrap().status, 200);
    }

    #[test]
    fn store_response_replaces_previous() {
        let mut state = ScenarioState::new();
        state.store_response(ApiResponse::new(200, json!([])));
        state.store_response(ApiResponse::new(404, json!({"message": "Not Found"})));
        assert_eq!(state.last_response().unwrap().status, 404);
    }

    #[test]
    fn retrieve_response_with_wrong_type_fails() {
        let mut state = ScenarioState::new();
        state.store_response(ApiResponse::new(200, json!({"unexpected": true})));
        assert!(matches!(
            state.retrieve_response::<Vec<Elixir>>().unwrap_err(),
            StateError::Decode(_)
        ));
    }

    // ── keyed data ──

    #[test]
    fn store_and_retrieve_data() {
        let mut state = ScenarioState::new();
        state.store_data("wizardId", "1".to_string()).unwrap();
        state.store_data("count", 3usize).unwrap();

        assert_eq!(state.retrieve_data::<String>("wizardId").unwrap(), "1");
        assert_eq!(*state.retrieve_data::<usize>("count").unwrap(), 3);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn store_data_rejects_empty_key() {
        let mut state = ScenarioState::new();
        assert_eq!(state.store_data("", 1).unwrap_err(), StateError::EmptyKey);
        assert!(state.is_empty());
    }

    #[test]
    fn retrieve_missing_key_fails() {
        let state = ScenarioState::new();
        let err = state.retrieve_data::<String>("wizardId").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"No data found for key: wizardId");
    }

    #[test]
    fn retrieve_with_wrong_type_fails() {
        let mut state = ScenarioState::new();
        state.store_data("count", 3u32).unwrap();
        let err = state.retrieve_data::<String>("count").unwrap_err();
        assert_eq!(
            err,
            StateError::TypeMismatch {
                key: "count".into(),
                expected: type_name::<String>(),
            }
        );
    }

    #[test]
    fn store_data_overwrites() {
        let mut state = ScenarioState::new();
        state.store_data("k", 1i32).unwrap();
        state.store_data("k", "two").unwrap();
        assert_eq!(*state.retrieve_data::<&str>("k").unwrap(), "two");
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn clear_data_and_clear_all() {
        let mut state = ScenarioState::new();
        state.store_response(ApiResponse::new(200, json!([])));
        state.store_data("a", 1).unwrap();
        state.store_data("b", 2).unwrap();

        assert!(state.clear_data("a"));
        assert!(!state.clear_data("a"));
        assert!(!state.contains_data("a"));
        assert!(state.contains_data("b"));

        state.clear_all_data();
        assert!(state.is_empty());
        assert!(state.retrieve_data::<i32>("b").is_err());
        assert!(state.last_response().is_ok());
    }

    #[test]
    fn stored_responses_can_be_kept_as_data() {
        let mut state = ScenarioState::new();
        state
            .store_data("created", ApiResponse::new(201, json!({"id": "9"})))
            .unwrap();
        let created = state.retrieve_data::<ApiResponse>("created").unwrap();
        assert_eq!(created.body["id"], "9");
    }

    // ── isolation ──

    #[test]
    fn state_is_send() {
        assert_send::<ScenarioState>();
    }

    #[test]
    fn concurrent_scenarios_do_not_share_state() {
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                std::thread::spawn(move || {
                    let mut state = ScenarioState::new();
                    state.store_data("worker", worker).unwrap();
                    state.store_response(ApiResponse::new(200 + worker as u16, json!(worker)));
                    std::thread::yield_now();
                    (
                        *state.retrieve_data::<i32>("worker").unwrap(),
                        state.last_response().unwrap().status,
                        state.len(),
                    )
                })
            })
            .collect();

        for (worker, handle) in handles.into_iter().enumerate() {
            let (value, status, len) = handle.join().unwrap();
            assert_eq!(value, worker as i32);
            assert_eq!(status, 200 + worker as u16);
            assert_eq!(len, 1);
        }
    }

    #[test]
    fn debug_lists_keys_not_values() {
        let mut state = ScenarioState::new();
        state.store_data("token", "secret".to_string()).unwrap();
        let rendered = format!("{state:?}");
        assert!(rendered.contains("token"));
        assert!(!rendered.contains("secret"));
    }
}
