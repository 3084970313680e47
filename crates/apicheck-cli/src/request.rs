//! Request and expectation arguments shared by `call` and `check`

use std::fmt;

use clap::{Args, ValueEnum};
use serde_json::Value;

use apicheck_core::predicate::non_empty;
use apicheck_core::{
    ApiResponse, ScenarioState, StateError, ValidationError, assert_error, assert_strict_match,
    assert_subset_match, assert_valid, assert_valid_with,
};
use apicheck_runner::{DispatchError, QueryParams, RequestDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Put,
    Delete,
}

impl MethodArg {
    fn takes_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for MethodArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Service name in the registry
    pub service: String,

    /// HTTP method
    #[arg(value_enum, ignore_case = true)]
    pub method: MethodArg,

    /// Endpoint path, e.g. Wizards
    pub endpoint: String,

    /// Extra path segments appended after the endpoint
    pub segments: Vec<String>,

    /// Query parameter as key=value (repeatable, order kept)
    #[arg(short, long = "query", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,

    /// JSON request body for POST/PUT (default: {})
    #[arg(short, long, value_parser = parse_json)]
    pub body: Option<Value>,
}

impl RequestArgs {
    /// `METHOD endpoint/segments` for report lines.
    pub fn label(&self) -> String {
        let mut path = self.endpoint.trim_matches('/').to_string();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment.trim_matches('/'));
        }
        format!("{} /{path}", self.method)
    }

    pub async fn send(&self, dispatcher: &RequestDispatcher) -> Result<ApiResponse, DispatchError> {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        let query: QueryParams = self
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let query = (!query.is_empty()).then_some(&query);

        if self.body.is_some() && !self.method.takes_body() {
            log::warn!("--body is ignored for {}", self.method);
        }
        let body = self
            .body
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));

        match self.method {
            MethodArg::Get => dispatcher.get(&self.endpoint, &segments, query).await,
            MethodArg::Post => {
                dispatcher
                    .post(&self.endpoint, &segments, &body, query)
                    .await
            }
            MethodArg::Put => dispatcher.put(&self.endpoint, &segments, &body, query).await,
            MethodArg::Delete => dispatcher.delete(&self.endpoint, &segments, query).await,
        }
    }
}

/// At most one body expectation; none means "any non-null body".
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct ExpectArgs {
    /// Body must contain these properties (extra properties allowed)
    #[arg(long, value_parser = parse_json)]
    pub subset: Option<Value>,

    /// Body must equal this JSON exactly
    #[arg(long, value_parser = parse_json)]
    pub strict: Option<Value>,

    /// Body must contain this text (use with an error status)
    #[arg(long)]
    pub error_text: Option<String>,

    /// Body must be a non-empty array, object or string
    #[arg(long)]
    pub non_empty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Valid,
    NonEmpty,
    Subset(Value),
    Strict(Value),
    ErrorText(String),
}

impl From<ExpectArgs> for Expectation {
    fn from(args: ExpectArgs) -> Self {
        if let Some(expected) = args.subset {
            Self::Subset(expected)
        } else if let Some(expected) = args.strict {
            Self::Strict(expected)
        } else if let Some(text) = args.error_text {
            Self::ErrorText(text)
        } else if args.non_empty {
            Self::NonEmpty
        } else {
            Self::Valid
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("valid body"),
            Self::NonEmpty => f.write_str("non-empty body"),
            Self::Subset(_) => f.write_str("subset match"),
            Self::Strict(_) => f.write_str("strict match"),
            Self::ErrorText(text) => write!(f, "error text {text:?}"),
        }
    }
}

impl Expectation {
    /// Validate the last response stored in `state`.
    ///
    /// The outer error is a tool problem (nothing stored); the inner one is
    /// the validation verdict.
    pub fn evaluate(
        &self,
        state: &ScenarioState,
        status: u16,
    ) -> Result<Result<(), ValidationError>, StateError> {
        let response = state.retrieve_response::<Value>()?;
        Ok(match self {
            Self::Valid => assert_valid(&response, status),
            Self::NonEmpty => assert_valid_with(&response, status, &non_empty()),
            Self::Subset(expected) => assert_subset_match(&response, status, expected),
            Self::Strict(expected) => assert_strict_match(&response, status, expected),
            Self::ErrorText(text) => assert_error(&response, status, Some(text.as_str())),
        })
    }
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}
