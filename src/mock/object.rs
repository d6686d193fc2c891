//! The mock proxy: a named stand-in for a registered contract.
//!
//! Every call goes through [`Mock::call`] (or [`Mock::call_signature`]),
//! which captures the invocation, resolves a behavior under the ledger and
//! definition locks, appends the record and then runs the behavior with all
//! locks released.

use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::behavior::definition::{Behavior, BehaviorDefiningInvocation, Collaborator, UsageMode};
use crate::behavior::resolver;
use crate::core::contract::{Contract, ContractRegistry, MethodId, MethodSignature};
use crate::core::errors::{MockError, Result};
use crate::core::value::{Kind, Value};
use crate::invocation::matcher::InvocationShape;
use crate::invocation::record::ProxyInvocation;
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::scenario::Scenario;

/// Scenario-unique mock identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockId(pub(crate) u64);

impl MockId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a mock. Clones share definitions, history and identity.
#[derive(Clone)]
pub struct Mock {
    inner: Arc<MockInner>,
}

pub(crate) struct MockInner {
    id: MockId,
    name: Arc<str>,
    contract: Arc<Contract>,
    registry: Arc<ContractRegistry>,
    scenario: Scenario,
    real: Option<Arc<dyn Collaborator>>,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    definitions: Vec<BehaviorDefiningInvocation>,
    nested: Vec<NestedMock>,
}

/// A nested mock reached through a call on its parent, with the shape that
/// reaches it.
struct NestedMock {
    shape: InvocationShape,
    mock: Mock,
}

impl Mock {
    pub(crate) fn create(
        name: &str,
        contract: Arc<Contract>,
        registry: Arc<ContractRegistry>,
        scenario: Scenario,
        real: Option<Arc<dyn Collaborator>>,
    ) -> Self {
        let mock = Self {
            inner: Arc::new(MockInner {
                id: scenario.next_mock_id(),
                name: Arc::from(name),
                contract,
                registry,
                scenario,
                real,
                state: Mutex::new(MockState::default()),
            }),
        };
        mock.inner.scenario.register(&mock);
        mock.inner.scenario.trace_with(|| {
            LogEntry::new(EventType::MockCreated, Severity::Info)
                .with_mock(mock.name())
                .with_contract(mock.contract().name())
                .with_details(if mock.is_partial() { "partial" } else { "full" })
                .with_config_hash(mock.scenario().config_hash())
        });
        mock
    }

    #[must_use]
    pub fn id(&self) -> MockId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The contract this mock stands in for.
    #[must_use]
    pub fn contract(&self) -> &Contract {
        &self.inner.contract
    }

    /// The scenario this mock reports into.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.inner.scenario
    }

    /// Whether unconfigured calls pass through to a real implementation.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.inner.real.is_some()
    }

    /// Reference identity.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of behavior-defining invocations currently installed.
    #[must_use]
    pub fn definition_count(&self) -> usize {
        self.inner.state.lock().definitions.len()
    }

    /// Remove every behavior-defining invocation of this mock.
    pub fn reset_behavior(&self) {
        self.inner.state.lock().definitions.clear();
    }

    // ──────────────────── proxy surface ────────────────────

    /// Call `method` by name; the overload is picked by argument count.
    #[track_caller]
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let location = Location::caller();
        let signature = self.inner.contract.resolve(method, args.len())?.clone();
        self.invoke(&signature, args, location)
    }

    /// Call an exact method identity, for overloads sharing name and arity.
    #[track_caller]
    pub fn call_signature(&self, method: &MethodId, args: Vec<Value>) -> Result<Value> {
        let location = Location::caller();
        let signature = self.inner.contract.signature(method)?.clone();
        if args.len() != method.arity() {
            return Err(MockError::UnknownMethod {
                contract: self.inner.contract.name().to_string(),
                method: method.name().to_string(),
                arity: args.len(),
            });
        }
        self.invoke(&signature, args, location)
    }

    fn invoke(
        &self,
        signature: &MethodSignature,
        args: Vec<Value>,
        location: &'static Location<'static>,
    ) -> Result<Value> {
        let scenario = &self.inner.scenario;
        let captured = ProxyInvocation::capture(
            self.id(),
            Arc::clone(&self.inner.name),
            signature.id().clone(),
            args,
            scenario.config().snapshot.max_depth,
            location,
        );

        let (behavior, invocation, sequence, outcome) = {
            let mut ledger = scenario.lock_ledger();
            let mut state = self.inner.state.lock();
            let (behavior, outcome) = match resolver::select(&mut state.definitions, &captured) {
                Some(behavior) => {
                    let outcome = behavior.describe();
                    (behavior, outcome)
                }
                None => self.stub_default(&mut state, signature, &captured),
            };
            drop(state);
            let record = ledger.append(captured, outcome.clone());
            (behavior, record.invocation().clone(), record.sequence(), outcome)
        };

        scenario.trace_with(|| {
            LogEntry::new(EventType::Invocation, Severity::Info)
                .with_mock(self.name())
                .with_method(invocation.method().to_string())
                .with_args(invocation.snapshot().iter().map(ToString::to_string).collect())
                .with_outcome(outcome)
                .with_sequence(sequence)
                .with_location(format!("{}:{}", location.file(), location.line()))
        });

        behavior.execute(&invocation, self.inner.real.as_ref())
    }

    /// Behavior for a call no definition answers: passthrough on partial
    /// mocks, else the kind default, else a cached nested auto-mock.
    fn stub_default(
        &self,
        state: &mut MockState,
        signature: &MethodSignature,
        invocation: &ProxyInvocation,
    ) -> (Behavior, String) {
        if self.is_partial() {
            return (Behavior::Passthrough, "passes through (unstubbed)".to_string());
        }
        let strings = self.inner.scenario.config().defaults.string_default;
        if let Some(value) = resolver::default_for(signature.returns(), strings) {
            let outcome = format!("default {value}");
            return (Behavior::Return(value), outcome);
        }

        let cached = state.nested.iter().find(|n| {
            n.shape
                .matches(invocation.method(), invocation.arguments(), invocation.snapshot())
        });
        let nested = match cached {
            Some(entry) => entry.mock.clone(),
            None => {
                let shape = InvocationShape::exact(invocation.method().clone(), invocation.snapshot());
                match self.spawn_nested(signature, shape, state) {
                    Some(mock) => mock,
                    None => return (Behavior::Return(Value::Null), "default null".to_string()),
                }
            }
        };
        let outcome = format!("auto-mock<{}>", nested.name());
        (Behavior::Delegate(nested), outcome)
    }

    /// Create a nested mock for `signature`'s return contract and cache it
    /// under `shape`.
    fn spawn_nested(
        &self,
        signature: &MethodSignature,
        shape: InvocationShape,
        state: &mut MockState,
    ) -> Option<Self> {
        let Kind::Mock(contract_name) = signature.returns() else {
            return None;
        };
        let contract = self.inner.registry.get(contract_name).ok()?;
        let name = format!("{}.{}", self.name(), signature.id().name());
        let nested = Self::create(
            &name,
            contract,
            Arc::clone(&self.inner.registry),
            self.inner.scenario.clone(),
            None,
        );
        state.nested.push(NestedMock {
            shape,
            mock: nested.clone(),
        });
        Some(nested)
    }

    // ──────────────────── chain support ────────────────────

    /// Contract of the nested mocks `signature` returns.
    pub(crate) fn returned_contract(&self, signature: &MethodSignature) -> Result<Arc<Contract>> {
        match signature.returns() {
            Kind::Mock(contract) => self.inner.registry.get(contract),
            other => Err(MockError::NotMockable {
                method: signature.id().to_string(),
                returns: other.to_string(),
            }),
        }
    }

    /// Nested mock reached through `shape`, created and wired with a
    /// persistent delegate definition when missing.
    pub(crate) fn nested_for_definition(
        &self,
        signature: &MethodSignature,
        shape: InvocationShape,
    ) -> Result<Self> {
        if !signature.returns().is_mockable() {
            return Err(MockError::NotMockable {
                method: signature.id().to_string(),
                returns: signature.returns().to_string(),
            });
        }
        let mut state = self.inner.state.lock();
        let existing = state
            .nested
            .iter()
            .find(|n| n.shape.same_shape(&shape))
            .map(|n| n.mock.clone());
        let nested = match existing {
            Some(mock) => mock,
            None => self
                .spawn_nested(signature, shape.clone(), &mut state)
                .ok_or_else(|| MockError::UnknownContract {
                    contract: signature.returns().to_string(),
                    details: "not registered".to_string(),
                })?,
        };

        let wired = state
            .definitions
            .iter()
            .rev()
            .find(|d| {
                d.mode() == UsageMode::Persistent && d.shape().same_shape(&shape)
            })
            .is_some_and(|d| matches!(d.behavior(), Behavior::Delegate(m) if m.same(&nested)));
        if !wired {
            state.definitions.push(BehaviorDefiningInvocation::new(
                shape,
                Behavior::Delegate(nested.clone()),
                UsageMode::Persistent,
            ));
        }
        Ok(nested)
    }

    /// Every nested mock reachable through `shape`: the one a definition
    /// wired for exactly this shape, plus each one cached for a recorded call
    /// that `shape` matches. Definition order, without duplicates.
    pub(crate) fn nested_for_assertion(&self, shape: &InvocationShape) -> Vec<Self> {
        let reached: Vec<_> = self
            .inner
            .scenario
            .invocations_of(self)
            .into_iter()
            .filter(|r| shape.matches(r.method(), r.arguments(), r.snapshot()))
            .collect();
        let state = self.inner.state.lock();
        let mut found: Vec<Self> = Vec::new();
        for entry in &state.nested {
            let hit = entry.shape.same_shape(shape)
                || reached
                    .iter()
                    .any(|r| entry.shape.matches(r.method(), r.arguments(), r.snapshot()));
            if hit && !found.iter().any(|m| m.same(&entry.mock)) {
                found.push(entry.mock.clone());
            }
        }
        found
    }

    /// Append a definition.
    pub(crate) fn install(&self, definition: BehaviorDefiningInvocation) {
        let shape = definition.shape().to_string();
        let outcome = format!("{:?} {}", definition.mode(), definition.behavior().describe());
        self.inner.state.lock().definitions.push(definition);
        self.inner.scenario.trace_with(|| {
            LogEntry::new(EventType::BehaviorDefined, Severity::Info)
                .with_mock(self.name())
                .with_method(shape)
                .with_outcome(outcome)
        });
    }

    pub(crate) fn clear_used_flags(&self) {
        for definition in &mut self.inner.state.lock().definitions {
            definition.clear_used();
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<MockInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<MockInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("contract", &self.inner.contract.name())
            .field("partial", &self.is_partial())
            .finish()
    }
}
