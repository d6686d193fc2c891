#![forbid(unsafe_code)]

//! scenario_mock — scenario-based mock objects for Rust tests.
//!
//! A test builds a [`MockContext`](mock::MockContext), creates mocks of
//! explicitly registered contracts, defines behaviors through fluent chains,
//! lets the code under test call the mocks, and then verifies the shared
//! invocation history:
//! 1. **Definition** — `mock.stub().via(..).call(..).returns(..)` installs
//!    persistent or one-shot behaviors, synthesizing nested mocks along the path
//! 2. **Interception** — every call is snapshotted, resolved and recorded in
//!    the scenario in real-time order
//! 3. **Verification** — membership, absence, strict sequence and
//!    "no more invocations" assertions with a rendered transcript on failure
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use scenario_mock::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use scenario_mock::core::config::MockConfig;
//! use scenario_mock::invocation::matcher::{InvocationShape, regex};
//! ```

pub mod prelude;

pub mod behavior;
pub mod core;
pub mod invocation;
pub mod logger;
pub mod mock;
pub mod scenario;

pub use crate::core::errors::{MockError, Result};
