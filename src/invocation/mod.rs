//! Invocation capture and argument matching.

pub mod matcher;
pub mod record;
