//! apicheck-core: Building blocks for API test scenarios
//!
//! This crate resolves per-environment service configuration, defines the
//! normalized [`ApiResponse`], validates responses (predicate, subset and
//! strict comparison, error assertions) and holds per-scenario state.
//! It performs no network I/O; see `apicheck-runner` for dispatch.

pub mod compare;
pub mod config;
pub mod predicate;
pub mod response;
pub mod scenario;
pub mod validate;

pub use compare::{Mismatch, MismatchKind, strict_diff, subset_diff, values_equal};
pub use config::{ConfigError, ServiceConfiguration, ServiceRegistry};
pub use predicate::{BodyPredicate, PredicateExt, named};
pub use response::ApiResponse;
pub use scenario::{ScenarioState, StateError};
pub use validate::{
    DEFAULT_EXPECTED_STATUS, MatchMode, ValidationError, assert_error, assert_error_with,
    assert_status, assert_strict_match, assert_subset_match, assert_valid, assert_valid_with,
};
