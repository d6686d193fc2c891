//! Behavior resolution: which definition, if any, answers a live call.
//!
//! Selection rule, applied to one mock's definitions in definition order:
//! the oldest eligible one-shot match wins; otherwise the most recently
//! defined persistent match wins; otherwise the call gets a stub default.

use crate::behavior::definition::{Behavior, BehaviorDefiningInvocation, UsageMode};
use crate::core::config::StringDefault;
use crate::core::value::{Kind, Value};
use crate::invocation::record::ProxyInvocation;

/// Pick the definition answering `invocation` and consume it if one-shot.
///
/// Returns a clone of the selected behavior so it can run after the caller
/// releases its locks.
pub fn select(
    definitions: &mut [BehaviorDefiningInvocation],
    invocation: &ProxyInvocation,
) -> Option<Behavior> {
    let mut last_persistent = None;
    let mut first_one_shot = None;

    for (index, definition) in definitions.iter().enumerate() {
        if !definition.is_eligible() || !definition.matches(invocation) {
            continue;
        }
        match definition.mode() {
            UsageMode::OneShot => {
                first_one_shot = Some(index);
                break;
            }
            UsageMode::Persistent => last_persistent = Some(index),
        }
    }

    let index = first_one_shot.or(last_persistent)?;
    let definition = &mut definitions[index];
    if definition.mode() == UsageMode::OneShot {
        definition.mark_used();
    }
    Some(definition.behavior().clone())
}

/// Stub default for a declared return kind.
///
/// `None` means the kind is mockable and the caller should hand out a nested
/// auto-mock instead.
#[must_use]
pub fn default_for(kind: &Kind, strings: StringDefault) -> Option<Value> {
    let value = match kind {
        Kind::Unit | Kind::Object(_) | Kind::Any => Value::Null,
        Kind::Bool => Value::Bool(false),
        Kind::Int => Value::Int(0),
        Kind::Float => Value::Float(0.0),
        Kind::Str => match strings {
            StringDefault::Empty => Value::Str(String::new()),
            StringDefault::Null => Value::Null,
        },
        Kind::List => Value::List(Vec::new()),
        Kind::Map => Value::Map(std::collections::BTreeMap::new()),
        Kind::Mock(_) => return None,
    };
    Some(value)
}
