//! Convenience re-exports for test code.
//!
//! ```rust,no_run
//! use scenario_mock::prelude::*;
//! ```

// Core
pub use crate::core::config::{MockConfig, StringDefault};
pub use crate::core::contract::{Contract, ContractRegistry, MethodId};
pub use crate::core::errors::{AssertionKind, ErrorCategory, MockError, Result, SimulatedFailure};
pub use crate::core::value::{Kind, SharedRef, Value};

// Invocations and matchers
pub use crate::invocation::matcher::{
    Arg, ArgumentMatcher, InvocationShape, any, eq, is_null, len_eq, matching, not_null, ref_eq,
    regex, same,
};
pub use crate::invocation::record::{InvocationRecord, ProxyInvocation};
pub use crate::{args, values};

// Behaviors
pub use crate::behavior::definition::{Behavior, Collaborator, UsageMode};

// Mocks and scenario
pub use crate::mock::{AfterCreateMock, Mock, MockContext, MockContextBuilder, MockId, TestListener};
pub use crate::scenario::Scenario;
