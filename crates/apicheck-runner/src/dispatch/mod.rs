//! Request dispatch against one configured service
//!
//! A [`RequestDispatcher`] owns one resolved [`ServiceConfiguration`] and an
//! async reqwest client. Every verb builds the URL from the service base URL,
//! sends the request under two independent deadlines (see [`Deadlines`]) and
//! normalizes the reply into an [`ApiResponse`]. Status codes are never
//! interpreted here; a 404 is a successful dispatch.

mod body;
mod deadline;
mod url;

use std::time::Duration;

use apicheck_core::response::excerpt;
use apicheck_core::{ApiResponse, ConfigError, ServiceConfiguration, ServiceRegistry};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;

pub use deadline::{DeadlineKind, Deadlines};
pub use url::{QueryParams, QueryValue, build_url, join_path, normalize_segment};

/// Characters of the response body kept in the debug log line.
const LOG_BODY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    config: ServiceConfiguration,
    deadlines: Deadlines,
    client: reqwest::Client,
}

impl RequestDispatcher {
    /// # Errors
    ///
    /// Returns [`DispatchError::Client`] if the HTTP client cannot be built
    /// (e.g. no TLS backend available).
    pub fn new(config: ServiceConfiguration) -> Result<Self, DispatchError> {
        // Connections are not reused across requests.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| DispatchError::Client(error_chain(&e)))?;
        Ok(Self {
            deadlines: Deadlines::from_config(&config),
            config,
            client,
        })
    }

    /// Resolve `service` in `environment` and build a dispatcher for it.
    ///
    /// `None` selects the active environment: `APICHECK_ENV` when set, else
    /// the registry's `default_environment`.
    pub fn from_registry(
        registry: &ServiceRegistry,
        environment: Option<&str>,
        service: &str,
    ) -> Result<Self, DispatchError> {
        let config = match environment {
            Some(environment) => registry.resolve(Some(environment), service)?,
            None => registry.resolve_active(service)?,
        };
        Self::new(config)
    }

    pub fn config(&self) -> &ServiceConfiguration {
        &self.config
    }

    pub fn deadlines(&self) -> Deadlines {
        self.deadlines
    }

    /// The URL a verb would hit, without sending anything.
    pub fn url_for(
        &self,
        endpoint: &str,
        segments: &[&str],
        query: Option<&QueryParams>,
    ) -> Result<Url, DispatchError> {
        build_url(&self.config.base_url, endpoint, segments, query)
    }

    pub async fn get(
        &self,
        endpoint: &str,
        segments: &[&str],
        query: Option<&QueryParams>,
    ) -> Result<ApiResponse, DispatchError> {
        self.send(Method::GET, endpoint, segments, None, query).await
    }

    /// Send `body` as JSON.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        segments: &[&str],
        body: &B,
        query: Option<&QueryParams>,
    ) -> Result<ApiResponse, DispatchError> {
        let body = to_json(body)?;
        self.send(Method::POST, endpoint, segments, Some(body), query)
            .await
    }

    /// Send `body` as JSON.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        segments: &[&str],
        body: &B,
        query: Option<&QueryParams>,
    ) -> Result<ApiResponse, DispatchError> {
        let body = to_json(body)?;
        self.send(Method::PUT, endpoint, segments, Some(body), query)
            .await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        segments: &[&str],
        query: Option<&QueryParams>,
    ) -> Result<ApiResponse, DispatchError> {
        self.send(Method::DELETE, endpoint, segments, None, query)
            .await
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        segments: &[&str],
        body: Option<Value>,
        query: Option<&QueryParams>,
    ) -> Result<ApiResponse, DispatchError> {
        let url = self.url_for(endpoint, segments, query)?;
        let service = &self.config.service_name;
        log::debug!("[{service}] {method} {url}");

        match self.exchange(&method, &url, body).await {
            Ok(response) => {
                log::debug!(
                    "[{service}] {method} {url} -> {} {}",
                    response.status,
                    excerpt(&response.body.to_string(), LOG_BODY_CHARS)
                );
                Ok(response)
            }
            Err(e) => {
                log::error!("[{service}] {e}");
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<Value>,
    ) -> Result<ApiResponse, DispatchError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(payload) = &payload {
            request = request.json(payload);
        }

        let deadlines = self.deadlines;
        let failure = Failure {
            method,
            url,
            deadlines,
        };

        let exchange = async {
            let response = tokio::time::timeout(deadlines.response, request.send())
                .await
                .map_err(|_| failure.timeout(DeadlineKind::Response))?
                .map_err(|e| failure.transport(&e))?;

            let status = response.status().as_u16();
            let headers = body::collect_headers(response.headers());
            let text = response.text().await.map_err(|e| failure.transport(&e))?;
            let body = body::decode_body(headers.get("content-type").map(String::as_str), &text)
                .map_err(|detail| failure.decode(detail))?;

            Ok::<_, DispatchError>(ApiResponse {
                status,
                body,
                headers,
            })
        };

        tokio::time::timeout(deadlines.overall, exchange)
            .await
            .map_err(|_| failure.timeout(DeadlineKind::Overall))?
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, DispatchError> {
    serde_json::to_value(body).map_err(|e| DispatchError::Serialize(e.to_string()))
}

/// Builds [`DispatchError`]s that carry the request's method and URL.
struct Failure<'a> {
    method: &'a Method,
    url: &'a Url,
    deadlines: Deadlines,
}

impl Failure<'_> {
    fn timeout(&self, kind: DeadlineKind) -> DispatchError {
        DispatchError::Timeout {
            method: self.method.to_string(),
            url: self.url.to_string(),
            kind,
            limit: self.deadlines.limit(kind),
        }
    }

    fn transport(&self, e: &reqwest::Error) -> DispatchError {
        let method = self.method.to_string();
        let url = self.url.to_string();
        let detail = error_chain(e);
        if e.is_connect() {
            DispatchError::Connect {
                method,
                url,
                detail,
            }
        } else {
            DispatchError::Transport {
                method,
                url,
                detail,
            }
        }
    }

    fn decode(&self, detail: String) -> DispatchError {
        DispatchError::Decode {
            method: self.method.to_string(),
            url: self.url.to_string(),
            detail,
        }
    }
}

/// reqwest's top-level message rarely names the cause; append the sources.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{method} {url}: {kind} of {limit:?} exceeded")]
    Timeout {
        method: String,
        url: String,
        kind: DeadlineKind,
        limit: Duration,
    },
    #[error("{method} {url}: connection failed: {detail}")]
    Connect {
        method: String,
        url: String,
        detail: String,
    },
    #[error("{method} {url}: transport error: {detail}")]
    Transport {
        method: String,
        url: String,
        detail: String,
    },
    #[error("{method} {url}: unreadable response body: {detail}")]
    Decode {
        method: String,
        url: String,
        detail: String,
    },
    #[error("Invalid URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },
    #[error("Cannot serialize request body: {0}")]
    Serialize(String),
    #[error("HTTP client error: {0}")]
    Client(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DispatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
