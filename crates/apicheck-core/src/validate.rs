//! Response assertions
//!
//! Each assertion checks the status code first, then the body, and returns a
//! [`ValidationError`] describing expected vs. actual on the first failure.
//! Nothing here retries or recovers.

use serde::Serialize;
use serde_json::Value;

use crate::compare::{Mismatch, strict_diff, subset_diff};
use crate::predicate::BodyPredicate;
use crate::response::{ApiResponse, excerpt};

/// Status expected by callers that don't name one.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Longest body excerpt quoted in an error-text failure.
const MAX_BODY_EXCERPT: usize = 200;

/// Body comparison mode reported in [`ValidationError::BodyMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Subset,
    Strict,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subset => write!(f, "subset"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Unexpected status code. Expected {expected}, got {actual}")]
    StatusMismatch { expected: u16, actual: u16 },
    #[error("Response body is missing")]
    MissingBody,
    #[error("Response body rejected by {predicate}")]
    PredicateRejected { predicate: String },
    #[error("Response body does not match ({mode}): {mismatch}")]
    BodyMismatch { mode: MatchMode, mismatch: Mismatch },
    #[error("Expected error text not found. Expected: {expected:?} in {body}")]
    ErrorTextNotFound { expected: String, body: String },
    #[error("Error response body rejected by {predicate}")]
    ErrorPredicateRejected { predicate: String },
    #[error("Cannot serialize body: {0}")]
    Serialize(String),
}

/// Fail unless the status code is `expected`.
pub fn assert_status<T>(response: &ApiResponse<T>, expected: u16) -> Result<(), ValidationError> {
    if response.status != expected {
        return Err(ValidationError::StatusMismatch {
            expected,
            actual: response.status,
        });
    }
    Ok(())
}

/// Status must match and the body must not be `null`.
pub fn assert_valid<T: Serialize>(
    response: &ApiResponse<T>,
    expected_status: u16,
) -> Result<(), ValidationError> {
    assert_status(response, expected_status)?;
    if to_json(&response.body)?.is_null() {
        return Err(ValidationError::MissingBody);
    }
    Ok(())
}

/// Status must match and `predicate` must accept the body.
pub fn assert_valid_with<T, P>(
    response: &ApiResponse<T>,
    expected_status: u16,
    predicate: &P,
) -> Result<(), ValidationError>
where
    P: BodyPredicate<T> + ?Sized,
{
    assert_status(response, expected_status)?;
    if !predicate.evaluate(&response.body) {
        return Err(ValidationError::PredicateRejected {
            predicate: predicate.describe(),
        });
    }
    Ok(())
}

/// Status must match and every property of `expected_body` must equal the
/// actual one. Extra actual properties pass; properties left out of
/// `expected_body` (e.g. `None` fields skipped during serialization) are not
/// checked.
pub fn assert_subset_match<T, E>(
    response: &ApiResponse<T>,
    expected_status: u16,
    expected_body: &E,
) -> Result<(), ValidationError>
where
    T: Serialize,
    E: Serialize + ?Sized,
{
    assert_status(response, expected_status)?;
    let expected = to_json(expected_body)?;
    let actual = to_json(&response.body)?;
    match subset_diff(&expected, &actual) {
        Some(mismatch) => Err(ValidationError::BodyMismatch {
            mode: MatchMode::Subset,
            mismatch,
        }),
        None => Ok(()),
    }
}

/// Status must match and the body must deep-equal `expected_body`, with no
/// extra or missing property on either side.
pub fn assert_strict_match<T, E>(
    response: &ApiResponse<T>,
    expected_status: u16,
    expected_body: &E,
) -> Result<(), ValidationError>
where
    T: Serialize,
    E: Serialize + ?Sized,
{
    assert_status(response, expected_status)?;
    let expected = to_json(expected_body)?;
    let actual = to_json(&response.body)?;
    match strict_diff(&expected, &actual) {
        Some(mismatch) => Err(ValidationError::BodyMismatch {
            mode: MatchMode::Strict,
            mismatch,
        }),
        None => Ok(()),
    }
}

/// Status must match and, when given, the body text must contain
/// `expected_text`. An empty `expected_text` is not checked.
pub fn assert_error<T: Serialize>(
    response: &ApiResponse<T>,
    expected_status: u16,
    expected_text: Option<&str>,
) -> Result<(), ValidationError> {
    assert_status(response, expected_status)?;
    check_error_text(&response.body, expected_text)
}

/// [`assert_error`] plus a predicate over the error body.
pub fn assert_error_with<T, P>(
    response: &ApiResponse<T>,
    expected_status: u16,
    expected_text: Option<&str>,
    predicate: &P,
) -> Result<(), ValidationError>
where
    T: Serialize,
    P: BodyPredicate<T> + ?Sized,
{
    assert_status(response, expected_status)?;
    check_error_text(&response.body, expected_text)?;
    if !predicate.evaluate(&response.body) {
        return Err(ValidationError::ErrorPredicateRejected {
            predicate: predicate.describe(),
        });
    }
    Ok(())
}

fn check_error_text<T: Serialize>(body: &T, expected_text: Option<&str>) -> Result<(), ValidationError> {
    let Some(expected) = expected_text.filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    let text = body_text(&to_json(body)?);
    if !text.contains(expected) {
        return Err(ValidationError::ErrorTextNotFound {
            expected: expected.to_string(),
            body: excerpt(&text, MAX_BODY_EXCERPT),
        });
    }
    Ok(())
}

/// String bodies as-is, everything else as compact JSON.
fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, ValidationError> {
    serde_json::to_value(value).map_err(|e| ValidationError::Serialize(e.to_string()))
}
