//! Mock behaviors and the stored rules that bind them to invocation shapes.

use std::fmt;
use std::sync::Arc;

use crate::core::errors::{MockError, RaisedError, Result};
use crate::core::value::Value;
use crate::invocation::matcher::InvocationShape;
use crate::invocation::record::ProxyInvocation;
use crate::mock::object::Mock;

/// Custom behavior computing a result from the live invocation.
pub type PerformFn = Arc<dyn Fn(&ProxyInvocation) -> Result<Value> + Send + Sync>;

/// The real implementation behind a partial mock.
pub trait Collaborator: Send + Sync {
    /// Answer a call the way the real collaborator would.
    fn invoke(&self, invocation: &ProxyInvocation) -> Result<Value>;
}

impl<F> Collaborator for F
where
    F: Fn(&ProxyInvocation) -> Result<Value> + Send + Sync,
{
    fn invoke(&self, invocation: &ProxyInvocation) -> Result<Value> {
        self(invocation)
    }
}

/// What a mock does when a definition is selected.
#[derive(Clone)]
pub enum Behavior {
    /// Answer with a value.
    Return(Value),
    /// Raise the configured error to the caller.
    Fail(RaisedError),
    /// Answer with another mock, continuing a chain.
    Delegate(Mock),
    /// Forward to the partial mock's real implementation.
    Passthrough,
    /// Run a custom closure.
    Perform(PerformFn),
}

impl Behavior {
    /// Short description recorded with each invocation.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Return(value) => format!("returns {value}"),
            Self::Fail(error) => format!("raises {error}"),
            Self::Delegate(mock) => format!("returns mock<{}>", mock.name()),
            Self::Passthrough => "passes through".to_string(),
            Self::Perform(_) => "performs custom behavior".to_string(),
        }
    }

    pub(crate) fn execute(
        &self,
        invocation: &ProxyInvocation,
        real: Option<&Arc<dyn Collaborator>>,
    ) -> Result<Value> {
        match self {
            Self::Return(value) => Ok(value.clone()),
            Self::Fail(error) => Err(MockError::Raised {
                method: invocation.method().to_string(),
                error: Arc::clone(error),
            }),
            Self::Delegate(mock) => Ok(Value::Mock(mock.clone())),
            Self::Passthrough => match real {
                Some(real) => real.invoke(invocation),
                None => Err(MockError::NoRealImplementation {
                    mock: invocation.mock_name().to_string(),
                }),
            },
            Self::Perform(perform) => perform(invocation),
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Whether a definition survives being matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageMode {
    /// Eligible for every matching call.
    Persistent,
    /// Eligible for exactly one matching call.
    OneShot,
}

/// A stored rule: shape + behavior + usage mode + used flag.
#[derive(Debug, Clone)]
pub struct BehaviorDefiningInvocation {
    shape: InvocationShape,
    behavior: Behavior,
    mode: UsageMode,
    used: bool,
}

impl BehaviorDefiningInvocation {
    #[must_use]
    pub const fn new(shape: InvocationShape, behavior: Behavior, mode: UsageMode) -> Self {
        Self {
            shape,
            behavior,
            mode,
            used: false,
        }
    }

    #[must_use]
    pub const fn shape(&self) -> &InvocationShape {
        &self.shape
    }

    #[must_use]
    pub const fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    #[must_use]
    pub const fn mode(&self) -> UsageMode {
        self.mode
    }

    /// True once a one-shot definition has answered a call.
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used
    }

    /// Persistent definitions are always eligible; one-shots until used.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        match self.mode {
            UsageMode::Persistent => true,
            UsageMode::OneShot => !self.used,
        }
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }

    pub(crate) fn clear_used(&mut self) {
        self.used = false;
    }

    /// Whether this rule applies to `invocation`, ignoring eligibility.
    #[must_use]
    pub fn matches(&self, invocation: &ProxyInvocation) -> bool {
        self.shape.matches(
            invocation.method(),
            invocation.arguments(),
            invocation.snapshot(),
        )
    }
}
