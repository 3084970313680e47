//! The two independent deadlines applied to every request

use std::time::Duration;

use apicheck_core::ServiceConfiguration;
use apicheck_core::config::{DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS};

/// Which deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    /// Whole exchange: connect, send, headers and body.
    Overall,
    /// Until response headers arrive.
    Response,
}

impl std::fmt::Display for DeadlineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overall => f.write_str("overall deadline"),
            Self::Response => f.write_str("response deadline"),
        }
    }
}

/// `overall` comes from `connection_timeout`, `response` from
/// `response_timeout`. Unset or zero values fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub overall: Duration,
    pub response: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            overall: Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS),
            response: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
        }
    }
}

impl Deadlines {
    #[must_use]
    pub fn from_config(config: &ServiceConfiguration) -> Self {
        Self {
            overall: config.effective_connection_timeout(),
            response: config.effective_response_timeout(),
        }
    }

    #[must_use]
    pub fn limit(&self, kind: DeadlineKind) -> Duration {
        match kind {
            DeadlineKind::Overall => self.overall,
            DeadlineKind::Response => self.response,
        }
    }

    /// [`Self::limit`] in whole milliseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn limit_ms(&self, kind: DeadlineKind) -> u64 {
        u64::try_from(self.limit(kind).as_millis()).unwrap_or(u64::MAX)
    }
}
