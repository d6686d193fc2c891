//! Behaviors, behavior-defining invocations, and resolution.

pub mod definition;
pub mod resolver;
