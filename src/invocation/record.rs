//! Invocation capture: immutable records of intercepted calls.
//!
//! A call on a mock is first materialized as a [`ProxyInvocation`] (method,
//! live arguments, argument snapshot, caller location). Once a behavior has
//! been chosen it is sealed into an [`InvocationRecord`] and appended to the
//! scenario.

use std::collections::HashSet;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::core::contract::MethodId;
use crate::core::value::{SharedRef, Value};
use crate::mock::object::MockId;

/// A call intercepted on a mock, before resolution.
#[derive(Debug, Clone)]
pub struct ProxyInvocation {
    mock_id: MockId,
    mock_name: Arc<str>,
    method: MethodId,
    arguments: Vec<Value>,
    snapshot: Vec<Value>,
    snapshot_degraded: bool,
    location: &'static Location<'static>,
}

impl ProxyInvocation {
    /// Capture a call, deep-copying the arguments into a snapshot.
    pub(crate) fn capture(
        mock_id: MockId,
        mock_name: Arc<str>,
        method: MethodId,
        arguments: Vec<Value>,
        max_depth: usize,
        location: &'static Location<'static>,
    ) -> Self {
        let mut snapshotter = Snapshotter::new(max_depth);
        let snapshot = arguments
            .iter()
            .map(|arg| snapshotter.copy(arg, 0))
            .collect();
        Self {
            mock_id,
            mock_name,
            method,
            arguments,
            snapshot,
            snapshot_degraded: snapshotter.degraded,
            location,
        }
    }

    #[must_use]
    pub const fn mock_id(&self) -> MockId {
        self.mock_id
    }

    #[must_use]
    pub fn mock_name(&self) -> &str {
        &self.mock_name
    }

    #[must_use]
    pub const fn method(&self) -> &MethodId {
        &self.method
    }

    /// Live argument values.
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Arguments as they were when the call was intercepted.
    #[must_use]
    pub fn snapshot(&self) -> &[Value] {
        &self.snapshot
    }

    /// Where the call was made.
    #[must_use]
    pub const fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub(crate) fn seal(self, sequence: u64, outcome: String) -> InvocationRecord {
        InvocationRecord {
            sequence,
            invocation: self,
            outcome,
        }
    }
}

/// Immutable fact that a method was called with given arguments.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    sequence: u64,
    invocation: ProxyInvocation,
    outcome: String,
}

impl InvocationRecord {
    /// 1-based position in the scenario.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub const fn invocation(&self) -> &ProxyInvocation {
        &self.invocation
    }

    #[must_use]
    pub const fn mock_id(&self) -> MockId {
        self.invocation.mock_id
    }

    #[must_use]
    pub fn mock_name(&self) -> &str {
        &self.invocation.mock_name
    }

    #[must_use]
    pub const fn method(&self) -> &MethodId {
        &self.invocation.method
    }

    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.invocation.arguments
    }

    #[must_use]
    pub fn snapshot(&self) -> &[Value] {
        &self.invocation.snapshot
    }

    /// Whether any argument could not be copied and shares the live reference.
    #[must_use]
    pub const fn snapshot_degraded(&self) -> bool {
        self.invocation.snapshot_degraded
    }

    #[must_use]
    pub const fn location(&self) -> &'static Location<'static> {
        self.invocation.location
    }

    /// Description of the behavior that answered the call.
    #[must_use]
    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    /// `mock.method(snapshot args)` rendering.
    #[must_use]
    pub fn call_text(&self) -> String {
        let args: Vec<String> = self.snapshot().iter().map(ToString::to_string).collect();
        format!(
            "{}.{}({})",
            self.mock_name(),
            self.method().name(),
            args.join(", ")
        )
    }
}

impl fmt::Display for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.call_text(), self.outcome)
    }
}

// ──────────────────── snapshot ────────────────────

/// Per-call deep copier. Shared cells are copied field-by-field into fresh
/// cells that keep their identity tag; opaque payloads, cells on the current
/// path (cycles), locked cells and anything past `max_depth` keep the live
/// reference and mark the snapshot degraded.
struct Snapshotter {
    max_depth: usize,
    visiting: HashSet<u64>,
    degraded: bool,
}

impl Snapshotter {
    fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            visiting: HashSet::new(),
            degraded: false,
        }
    }

    fn copy(&mut self, value: &Value, depth: usize) -> Value {
        match value {
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::Mock(_) => value.clone(),
            Value::List(items) => {
                if depth >= self.max_depth {
                    return self.share(value);
                }
                Value::List(items.iter().map(|v| self.copy(v, depth + 1)).collect())
            }
            Value::Map(entries) => {
                if depth >= self.max_depth {
                    return self.share(value);
                }
                Value::Map(
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), self.copy(v, depth + 1)))
                        .collect(),
                )
            }
            Value::Shared(cell) => {
                if depth >= self.max_depth || self.visiting.contains(&cell.id()) {
                    return self.share(value);
                }
                let Some(inner) = cell.try_lock().map(|guard| guard.clone()) else {
                    return self.share(value);
                };
                self.visiting.insert(cell.id());
                let copied = self.copy(&inner, depth + 1);
                self.visiting.remove(&cell.id());
                Value::Shared(SharedRef::with_identity(cell.id(), copied))
            }
            Value::Opaque(_) => self.share(value),
        }
    }

    fn share(&mut self, value: &Value) -> Value {
        self.degraded = true;
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Kind;
    use crate::values;

    fn capture(args: Vec<Value>, max_depth: usize) -> ProxyInvocation {
        ProxyInvocation::capture(
            MockId(1),
            Arc::from("repo"),
            MethodId::new("Repo", "save", &[Kind::Any]),
            args,
            max_depth,
            Location::caller(),
        )
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let cell = SharedRef::new(Value::map([("name", "ann")]));
        let inv = capture(vec![Value::Shared(cell.clone())], 8);
        cell.set(Value::map([("name", "bob")]));

        let snap = inv.snapshot()[0].as_shared().unwrap();
        assert_eq!(snap.id(), cell.id(), "snapshot keeps identity");
        assert_eq!(snap.get(), Value::map([("name", "ann")]));
        assert_eq!(inv.arguments()[0].as_shared().unwrap().get(), Value::map([("name", "bob")]));
        let record = inv.seal(1, "default".to_string());
        assert!(!record.snapshot_degraded());
    }

    #[test]
    fn opaque_arguments_degrade_to_reference() {
        let inv = capture(vec![Value::opaque(42_u64)], 8);
        assert_eq!(inv.snapshot()[0], inv.arguments()[0]);
        assert!(inv.seal(1, String::new()).snapshot_degraded());
    }

    #[test]
    fn cycles_fall_back_to_live_reference() {
        let cell = SharedRef::new(Value::Null);
        cell.set(Value::List(vec![Value::Shared(cell.clone())]));
        let inv = capture(vec![Value::Shared(cell.clone())], 8);
        let record = inv.seal(1, String::new());
        assert!(record.snapshot_degraded());
        cell.set(Value::Null);
    }

    #[test]
    fn depth_limit_keeps_reference() {
        let nested = Value::List(vec![Value::List(vec![Value::List(vec![Value::from(1)])])]);
        let inv = capture(vec![nested.clone()], 2);
        assert_eq!(inv.snapshot()[0], nested);
        assert!(inv.seal(1, String::new()).snapshot_degraded());
    }

    #[test]
    fn locked_cell_does_not_block_capture() {
        let cell = SharedRef::new(Value::from(1));
        let guard = cell.lock();
        let inv = capture(vec![Value::Shared(cell.clone())], 8);
        drop(guard);
        assert!(inv.seal(1, String::new()).snapshot_degraded());
    }

    #[test]
    fn record_renders_call_text() {
        let inv = capture(values!["a"], 8);
        let record = inv.seal(3, "returns 1".to_string());
        assert_eq!(record.sequence(), 3);
        assert_eq!(record.to_string(), "repo.save(\"a\") -> returns 1");
    }
}
