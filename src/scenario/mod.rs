//! Scenario: the shared invocation history of one test and its assertions.

pub mod ledger;
pub mod report;

pub use ledger::Scenario;
