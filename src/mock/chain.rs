//! Fluent definition and assertion statements spanning nested calls.
//!
//! A statement walks zero or more intermediate steps with `via` and ends with
//! a terminal `call`. Intermediate steps are satisfied by nested mocks that
//! are reused for the same (method, matcher shape), so separate statements
//! about one path compose. Definition statements never touch the scenario.
//!
//! Errors found mid-statement are held until the terminal action returns
//! them, so a statement reads as one expression:
//!
//! ```
//! use scenario_mock::prelude::*;
//!
//! let ctx = MockContext::builder()
//!     .contract(Contract::builder("Service").method("repo", &[], Kind::mock("Repo")).build()?)
//!     .contract(Contract::builder("Repo").method("find", &[Kind::Int], Kind::Str).build()?)
//!     .build()?;
//! let service = ctx.create_mock("service", "Service")?;
//!
//! service.stub().via("repo", args![]).call("find", args![7]).returns("seven")?;
//!
//! let repo = service.call("repo", values![])?;
//! let repo = repo.as_mock().expect("chained mock");
//! assert_eq!(repo.call("find", values![7])?, Value::from("seven"));
//!
//! service.assert_invoked().via("repo", args![]).call("find", args![7])?;
//! # Ok::<(), scenario_mock::MockError>(())
//! ```

use std::sync::Arc;

use crate::behavior::definition::{Behavior, BehaviorDefiningInvocation, UsageMode};
use crate::core::contract::{Contract, MethodSignature};
use crate::core::errors::{AssertionKind, MockError, Result, SimulatedFailure};
use crate::core::value::Value;
use crate::invocation::matcher::{Arg, InvocationShape};
use crate::invocation::record::ProxyInvocation;
use crate::mock::object::Mock;

impl Mock {
    /// Enter definition mode.
    #[must_use]
    pub fn stub(&self) -> DefinitionRecorder {
        DefinitionRecorder {
            mock: self.clone(),
            error: None,
        }
    }

    /// Assert that a call (reached through the chain) was recorded.
    #[must_use]
    pub fn assert_invoked(&self) -> AssertionRecorder {
        AssertionRecorder::new(self, AssertionKind::Invoked)
    }

    /// Assert that a call (reached through the chain) was never recorded.
    #[must_use]
    pub fn assert_not_invoked(&self) -> AssertionRecorder {
        AssertionRecorder::new(self, AssertionKind::NotInvoked)
    }

    /// Assert that a call was recorded after the scenario's sequence cursor.
    #[must_use]
    pub fn assert_invoked_in_sequence(&self) -> AssertionRecorder {
        AssertionRecorder::new(self, AssertionKind::InvokedInSequence)
    }
}

/// Resolve a statement step against `contract`. A name with a single
/// overload of a different arity is reported as a matcher arity mistake, not
/// an unknown method.
fn shape_for(contract: &Contract, method: &str, args: Vec<Arg>) -> Result<(MethodSignature, InvocationShape)> {
    let signature = match contract.resolve(method, args.len()) {
        Ok(signature) => signature.clone(),
        Err(error @ MockError::UnknownMethod { .. }) => {
            let mut named = contract.methods().iter().filter(|m| m.id().name() == method);
            match (named.next(), named.next()) {
                (Some(sole), None) => sole.clone(),
                _ => return Err(error),
            }
        }
        Err(error) => return Err(error),
    };
    let shape = InvocationShape::new(signature.id().clone(), args)?;
    Ok((signature, shape))
}

// ──────────────────── definitions ────────────────────

/// A definition statement in progress.
#[must_use = "a definition statement does nothing until a terminal action runs"]
pub struct DefinitionRecorder {
    mock: Mock,
    error: Option<MockError>,
}

impl DefinitionRecorder {
    /// Intermediate step: continue on the nested mock `method(args)` returns.
    pub fn via(mut self, method: &str, args: Vec<Arg>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let step = shape_for(self.mock.contract(), method, args)
            .and_then(|(signature, shape)| self.mock.nested_for_definition(&signature, shape));
        match step {
            Ok(nested) => self.mock = nested,
            Err(error) => self.error = Some(error),
        }
        self
    }

    /// Terminal step: the call whose behavior is being defined.
    pub fn call(self, method: &str, args: Vec<Arg>) -> PendingDefinition {
        let shape = match self.error {
            Some(error) => Err(error),
            None => shape_for(self.mock.contract(), method, args).map(|(_, shape)| shape),
        };
        PendingDefinition {
            mock: self.mock,
            shape,
        }
    }
}

/// A terminal call awaiting its behavior.
#[must_use = "a definition is only installed by one of its terminal actions"]
pub struct PendingDefinition {
    mock: Mock,
    shape: Result<InvocationShape>,
}

impl PendingDefinition {
    fn install(self, behavior: Behavior, mode: UsageMode) -> Result<()> {
        let shape = self.shape?;
        if matches!(behavior, Behavior::Passthrough) && !self.mock.is_partial() {
            return Err(MockError::NoRealImplementation {
                mock: self.mock.name().to_string(),
            });
        }
        self.mock
            .install(BehaviorDefiningInvocation::new(shape, behavior, mode));
        Ok(())
    }

    /// Return `value` on every matching call.
    pub fn returns(self, value: impl Into<Value>) -> Result<()> {
        self.install(Behavior::Return(value.into()), UsageMode::Persistent)
    }

    /// Return `value` on the next matching call only.
    pub fn once_returns(self, value: impl Into<Value>) -> Result<()> {
        self.install(Behavior::Return(value.into()), UsageMode::OneShot)
    }

    /// Raise `error` on every matching call.
    pub fn raises<E>(self, error: E) -> Result<()>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.install(Behavior::Fail(Arc::new(error)), UsageMode::Persistent)
    }

    /// Raise `error` on the next matching call only.
    pub fn once_raises<E>(self, error: E) -> Result<()>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.install(Behavior::Fail(Arc::new(error)), UsageMode::OneShot)
    }

    /// Raise a [`SimulatedFailure`] carrying `message` on every matching call.
    pub fn fails_with(self, message: impl Into<String>) -> Result<()> {
        self.raises(SimulatedFailure::new(message))
    }

    /// Raise a [`SimulatedFailure`] on the next matching call only.
    pub fn once_fails_with(self, message: impl Into<String>) -> Result<()> {
        self.once_raises(SimulatedFailure::new(message))
    }

    /// Compute the result from the live invocation on every matching call.
    pub fn performs<F>(self, perform: F) -> Result<()>
    where
        F: Fn(&ProxyInvocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.install(Behavior::Perform(Arc::new(perform)), UsageMode::Persistent)
    }

    pub fn once_performs<F>(self, perform: F) -> Result<()>
    where
        F: Fn(&ProxyInvocation) -> Result<Value> + Send + Sync + 'static,
    {
        self.install(Behavior::Perform(Arc::new(perform)), UsageMode::OneShot)
    }

    /// Answer every matching call with `other`.
    pub fn delegates_to(self, other: &Mock) -> Result<()> {
        self.install(Behavior::Delegate(other.clone()), UsageMode::Persistent)
    }

    /// Forward every matching call to the partial mock's real implementation.
    pub fn passes_through(self) -> Result<()> {
        self.install(Behavior::Passthrough, UsageMode::Persistent)
    }
}

// ──────────────────── assertions ────────────────────

/// An assertion statement in progress.
///
/// A step whose matchers select several recorded calls can reach several
/// nested mocks; the walk carries all of them and the terminal check runs
/// over their combined history.
#[must_use = "an assertion only runs when its terminal call is made"]
pub struct AssertionRecorder {
    mocks: Vec<Mock>,
    kind: AssertionKind,
    state: Walk,
}

enum Walk {
    Open,
    /// An intermediate step was never reached, so nothing beyond it was.
    /// Later steps are still checked against this contract.
    Unreached(Arc<Contract>),
    Failed(MockError),
}

impl AssertionRecorder {
    fn new(mock: &Mock, kind: AssertionKind) -> Self {
        Self {
            mocks: vec![mock.clone()],
            kind,
            state: Walk::Open,
        }
    }

    fn check(&self, shape: &InvocationShape) -> Result<()> {
        let scenario = self.mocks[0].scenario();
        match self.kind {
            AssertionKind::Invoked => scenario.assert_invoked_on(&self.mocks, shape),
            AssertionKind::NotInvoked => scenario.assert_not_invoked_on(&self.mocks, shape),
            AssertionKind::InvokedInSequence => {
                scenario.assert_invoked_in_sequence_on(&self.mocks, shape)
            }
            AssertionKind::NoMoreInvocations => scenario.assert_no_more_invocations(),
        }
    }

    /// Intermediate step. For positive assertions the step itself must have
    /// been invoked too.
    pub fn via(mut self, method: &str, args: Vec<Arg>) -> Self {
        let head = self.mocks[0].clone();
        match &self.state {
            Walk::Failed(_) => return self,
            Walk::Unreached(contract) => {
                self.state = match shape_for(contract, method, args)
                    .and_then(|(signature, _)| head.returned_contract(&signature))
                {
                    Ok(next) => Walk::Unreached(next),
                    Err(error) => Walk::Failed(error),
                };
                return self;
            }
            Walk::Open => {}
        }
        let (signature, shape) = match shape_for(head.contract(), method, args) {
            Ok(step) => step,
            Err(error) => {
                self.state = Walk::Failed(error);
                return self;
            }
        };
        if self.kind != AssertionKind::NotInvoked
            && let Err(error) = self.check(&shape)
        {
            self.state = Walk::Failed(error);
            return self;
        }

        let mut reached: Vec<Mock> = Vec::new();
        for mock in &self.mocks {
            for nested in mock.nested_for_assertion(&shape) {
                if !reached.iter().any(|m| m.same(&nested)) {
                    reached.push(nested);
                }
            }
        }
        if !reached.is_empty() {
            self.mocks = reached;
        } else if self.kind == AssertionKind::NotInvoked {
            self.state = match head.returned_contract(&signature) {
                Ok(next) => Walk::Unreached(next),
                Err(error) => Walk::Failed(error),
            };
        } else {
            self.state = Walk::Failed(MockError::AssertionFailed {
                kind: self.kind,
                message: format!("no nested mock was reached through {shape}"),
                expected: shape.to_string(),
                closest: String::new(),
                report: head.scenario().create_report(),
            });
        }
        self
    }

    /// Terminal step: run the assertion against this call's shape.
    pub fn call(self, method: &str, args: Vec<Arg>) -> Result<()> {
        match self.state {
            Walk::Failed(error) => Err(error),
            Walk::Unreached(contract) => shape_for(&contract, method, args).map(|_| ()),
            Walk::Open => {
                let (_, shape) = shape_for(self.mocks[0].contract(), method, args)?;
                self.check(&shape)
            }
        }
    }
}
