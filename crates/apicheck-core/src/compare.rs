//! Structural comparison of JSON bodies
//!
//! Two modes:
//! - strict: same key sets on both sides, same array lengths, recursive
//!   equality. Symmetric.
//! - subset: every key present in the expected value must match (strictly)
//!   on the actual side; anything else the actual value carries is ignored.
//!   Only the top level is treated as a subset.
//!
//! Numbers compare by value, so `1` and `1.0` are equal. `null` equals only
//! `null`. JSON is acyclic, so a plain recursive walk terminates.

use serde_json::{Map, Number, Value};

use crate::response::excerpt;

/// Kind of difference found between expected and actual values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Same JSON type, different value
    Value,
    /// Different JSON types (e.g. string vs number)
    Type,
    /// Key or index expected but absent on the actual side
    MissingKey,
    /// Key present on the actual side but not expected (strict only)
    UnexpectedKey,
    /// Arrays of different lengths (strict only)
    Length,
}

/// First difference found by a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Location, e.g. `$.items[0].name`
    pub path: String,
    pub kind: MismatchKind,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

/// Longest rendering of a value inside a mismatch message.
const MAX_VALUE_CHARS: usize = 120;

impl Mismatch {
    fn new(path: &str, kind: MismatchKind, expected: Option<&Value>, actual: Option<&Value>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            expected: expected.cloned(),
            actual: actual.cloned(),
        }
    }
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let expected = self.expected.as_ref().map(render).unwrap_or_default();
        let actual = self.actual.as_ref().map(render).unwrap_or_default();
        match self.kind {
            MismatchKind::MissingKey => {
                write!(f, "{}: missing, expected {expected}", self.path)
            }
            MismatchKind::UnexpectedKey => {
                write!(f, "{}: unexpected property with value {actual}", self.path)
            }
            MismatchKind::Length => write!(
                f,
                "{}: expected {expected} elements, got {actual}",
                self.path
            ),
            MismatchKind::Type | MismatchKind::Value => {
                write!(f, "{}: expected {expected}, got {actual}", self.path)
            }
        }
    }
}

fn render(value: &Value) -> String {
    excerpt(&value.to_string(), MAX_VALUE_CHARS)
}

/// `true` when `a` and `b` are structurally equal.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    strict_diff(a, b).is_none()
}

/// Deep comparison rejecting extra or missing properties on either side.
#[must_use]
pub fn strict_diff(expected: &Value, actual: &Value) -> Option<Mismatch> {
    strict_at("$", expected, actual)
}

/// Top-level subset comparison: expected properties must match, extra
/// actual properties are ignored.
///
/// For arrays each expected element must match the actual element at the
/// same index; trailing actual elements are ignored. Scalars compare
/// strictly.
#[must_use]
pub fn subset_diff(expected: &Value, actual: &Value) -> Option<Mismatch> {
    let path = "$";
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => e.iter().find_map(|(key, ev)| {
            let child = child_key(path, key);
            match a.get(key) {
                Some(av) => strict_at(&child, ev, av),
                None => Some(Mismatch::new(&child, MismatchKind::MissingKey, Some(ev), None)),
            }
        }),
        (Value::Array(e), Value::Array(a)) => e.iter().enumerate().find_map(|(i, ev)| {
            let child = child_index(path, i);
            match a.get(i) {
                Some(av) => strict_at(&child, ev, av),
                None => Some(Mismatch::new(&child, MismatchKind::MissingKey, Some(ev), None)),
            }
        }),
        _ => strict_at(path, expected, actual),
    }
}

fn strict_at(path: &str, expected: &Value, actual: &Value) -> Option<Mismatch> {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => objects_diff(path, e, a),
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return Some(Mismatch::new(
                    path,
                    MismatchKind::Length,
                    Some(&Value::from(e.len())),
                    Some(&Value::from(a.len())),
                ));
            }
            e.iter()
                .zip(a)
                .enumerate()
                .find_map(|(i, (ev, av))| strict_at(&child_index(path, i), ev, av))
        }
        (Value::Number(e), Value::Number(a)) => (!numbers_equal(e, a))
            .then(|| Mismatch::new(path, MismatchKind::Value, Some(expected), Some(actual))),
        (Value::String(e), Value::String(a)) => (e != a)
            .then(|| Mismatch::new(path, MismatchKind::Value, Some(expected), Some(actual))),
        (Value::Bool(e), Value::Bool(a)) => (e != a)
            .then(|| Mismatch::new(path, MismatchKind::Value, Some(expected), Some(actual))),
        (Value::Null, Value::Null) => None,
        _ => Some(Mismatch::new(
            path,
            MismatchKind::Type,
            Some(expected),
            Some(actual),
        )),
    }
}

fn objects_diff(path: &str, expected: &Map<String, Value>, actual: &Map<String, Value>) -> Option<Mismatch> {
    for (key, ev) in expected {
        let child = child_key(path, key);
        match actual.get(key) {
            Some(av) => {
                if let Some(mismatch) = strict_at(&child, ev, av) {
                    return Some(mismatch);
                }
            }
            None => {
                return Some(Mismatch::new(&child, MismatchKind::MissingKey, Some(ev), None));
            }
        }
    }

    actual
        .iter()
        .find(|(key, _)| !expected.contains_key(key.as_str()))
        .map(|(key, av)| {
            Mismatch::new(&child_key(path, key), MismatchKind::UnexpectedKey, None, Some(av))
        })
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn child_key(path: &str, key: &str) -> String {
    format!("{path}.{key}")
}

fn child_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}
