//! apicheck-runner: HTTP dispatch for API test scenarios

pub mod dispatch;

pub use dispatch::{
    DeadlineKind, Deadlines, DispatchError, QueryParams, QueryValue, RequestDispatcher,
};
