//! Mocks, fluent chains and the per-test mock context.

pub mod chain;
pub mod context;
pub mod object;

pub use context::{AfterCreateMock, MockContext, MockContextBuilder, TestListener};
pub use object::{Mock, MockId};
