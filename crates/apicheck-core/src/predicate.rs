//! Body predicates: the pluggable check behind `assert_valid_with` and
//! `assert_error_with`
//!
//! Any `Fn(&T) -> bool` is a predicate. Wrap one in [`named`] to get a
//! readable failure message, and combine them with [`PredicateExt`].

use serde_json::Value;

/// A single yes/no check over a response body.
pub trait BodyPredicate<T: ?Sized> {
    fn evaluate(&self, body: &T) -> bool;

    /// Label used in failure messages.
    fn describe(&self) -> String {
        "custom predicate".to_string()
    }
}

impl<T: ?Sized, F> BodyPredicate<T> for F
where
    F: Fn(&T) -> bool,
{
    fn evaluate(&self, body: &T) -> bool {
        self(body)
    }
}

/// Predicate with a human-readable label.
#[derive(Debug, Clone)]
pub struct Named<P> {
    label: String,
    inner: P,
}

/// Attach a label to a predicate.
pub fn named<P>(label: impl Into<String>, inner: P) -> Named<P> {
    Named {
        label: label.into(),
        inner,
    }
}

impl<T: ?Sized, P: BodyPredicate<T>> BodyPredicate<T> for Named<P> {
    fn evaluate(&self, body: &T) -> bool {
        self.inner.evaluate(body)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<T: ?Sized, A: BodyPredicate<T>, B: BodyPredicate<T>> BodyPredicate<T> for And<A, B> {
    fn evaluate(&self, body: &T) -> bool {
        self.0.evaluate(body) && self.1.evaluate(body)
    }

    fn describe(&self) -> String {
        format!("({} and {})", self.0.describe(), self.1.describe())
    }
}

#[derive(Debug, Clone)]
pub struct Or<A, B>(A, B);

impl<T: ?Sized, A: BodyPredicate<T>, B: BodyPredicate<T>> BodyPredicate<T> for Or<A, B> {
    fn evaluate(&self, body: &T) -> bool {
        self.0.evaluate(body) || self.1.evaluate(body)
    }

    fn describe(&self) -> String {
        format!("({} or {})", self.0.describe(), self.1.describe())
    }
}

#[derive(Debug, Clone)]
pub struct Not<P>(P);

impl<T: ?Sized, P: BodyPredicate<T>> BodyPredicate<T> for Not<P> {
    fn evaluate(&self, body: &T) -> bool {
        !self.0.evaluate(body)
    }

    fn describe(&self) -> String {
        format!("not {}", self.0.describe())
    }
}

/// Combinators available on every predicate.
pub trait PredicateExt<T: ?Sized>: BodyPredicate<T> + Sized {
    fn and<P: BodyPredicate<T>>(self, other: P) -> And<Self, P> {
        And(self, other)
    }

    fn or<P: BodyPredicate<T>>(self, other: P) -> Or<Self, P> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<T: ?Sized, P: BodyPredicate<T>> PredicateExt<T> for P {}

/// Non-empty array, object or string. Scalars other than `null` pass.
pub fn non_empty() -> Named<fn(&Value) -> bool> {
    named("non-empty body", is_non_empty as fn(&Value) -> bool)
}

fn is_non_empty(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Object body carrying `key` at the top level.
pub fn has_property(key: impl Into<String>) -> impl BodyPredicate<Value> {
    let key = key.into();
    named(format!("has property '{key}'"), move |body: &Value| {
        body.as_object().is_some_and(|map| map.contains_key(&key))
    })
}
