//! Per-test composition root: contracts, configuration, scenario and mocks.
//!
//! A [`MockContext`] is built once per test and passed explicitly to the code
//! under test; nothing is looked up from global state.

use std::path::Path;
use std::sync::Arc;

use crate::behavior::definition::Collaborator;
use crate::core::config::MockConfig;
use crate::core::contract::{Contract, ContractRegistry};
use crate::core::errors::{MockError, Result};
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::mock::object::Mock;
use crate::scenario::Scenario;

/// Callback run after the context creates a mock explicitly.
pub trait AfterCreateMock: Send + Sync {
    /// Inspect or pre-configure a freshly created mock. Errors abort the
    /// `create_mock` call.
    fn after_create_mock(&self, mock: &Mock, name: &str, contract: &str) -> Result<()>;
}

impl<F> AfterCreateMock for F
where
    F: Fn(&Mock, &str, &str) -> Result<()> + Send + Sync,
{
    fn after_create_mock(&self, mock: &Mock, name: &str, contract: &str) -> Result<()> {
        self(mock, name, contract)
    }
}

/// Lifecycle hook driven by a surrounding test harness.
pub trait TestListener {
    /// Called before each test body runs.
    fn before_test(&self);
}

/// Builder for [`MockContext`].
#[must_use]
#[derive(Default)]
pub struct MockContextBuilder {
    contracts: Vec<Contract>,
    hooks: Vec<Arc<dyn AfterCreateMock>>,
    config: Option<MockConfig>,
}

impl std::fmt::Debug for MockContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockContextBuilder")
            .field("contracts", &self.contracts.len())
            .field("hooks", &self.hooks.len())
            .field("config", &self.config)
            .finish()
    }
}

impl MockContextBuilder {
    /// Register a mockable contract.
    pub fn contract(mut self, contract: Contract) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Register a hook run after every explicit `create_mock`.
    pub fn after_create_mock(mut self, hook: impl AfterCreateMock + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Use `config` instead of defaults.
    pub fn config(mut self, config: MockConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from `path` (or the default path) with
    /// environment overrides.
    pub fn config_file(self, path: Option<&Path>) -> Result<Self> {
        Ok(self.config(MockConfig::load(path)?))
    }

    /// Freeze the contract registry and open the scenario.
    pub fn build(self) -> Result<MockContext> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let mut registry = ContractRegistry::new();
        for contract in self.contracts {
            registry.register(contract)?;
        }
        Ok(MockContext {
            registry: Arc::new(registry),
            scenario: Scenario::new(Arc::new(config)),
            hooks: self.hooks,
        })
    }
}

/// Owns the scenario and creates mocks reporting into it.
pub struct MockContext {
    registry: Arc<ContractRegistry>,
    scenario: Scenario,
    hooks: Vec<Arc<dyn AfterCreateMock>>,
}

impl std::fmt::Debug for MockContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockContext")
            .field("scenario", &self.scenario)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl MockContext {
    /// Start configuring a context.
    pub fn builder() -> MockContextBuilder {
        MockContextBuilder::default()
    }

    /// Create a mock of a registered contract.
    pub fn create_mock(&self, name: &str, contract: &str) -> Result<Mock> {
        self.spawn(name, contract, None)
    }

    /// Create a partial mock: unstubbed calls go to `real`.
    pub fn create_partial_mock(
        &self,
        name: &str,
        contract: &str,
        real: Arc<dyn Collaborator>,
    ) -> Result<Mock> {
        self.spawn(name, contract, Some(real))
    }

    fn spawn(&self, name: &str, contract: &str, real: Option<Arc<dyn Collaborator>>) -> Result<Mock> {
        if name.trim().is_empty() {
            return Err(MockError::InvalidConfig {
                details: "mock name must not be empty".to_string(),
            });
        }
        self.registry.validate_closure(contract)?;
        let resolved = self.registry.get(contract)?;
        let mock = Mock::create(
            name,
            resolved,
            Arc::clone(&self.registry),
            self.scenario.clone(),
            real,
        );
        for hook in &self.hooks {
            hook.after_create_mock(&mock, name, contract)?;
        }
        Ok(mock)
    }

    /// The shared scenario of this test.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &MockConfig {
        self.scenario.config()
    }

    /// Clear history, cursor, verified flags and one-shot used flags.
    pub fn reset_scenario(&self) {
        self.scenario.reset();
    }

    /// Fail if any recorded invocation was not verified.
    pub fn assert_no_more_invocations(&self) -> Result<()> {
        self.scenario.assert_no_more_invocations()
    }

    /// Write the scenario report to the trace log and return it.
    pub fn log_execution_scenario(&self) -> String {
        let report = self.scenario.create_report();
        self.scenario.trace_with(|| {
            LogEntry::new(EventType::ScenarioReport, Severity::Info).with_details(report.clone())
        });
        report
    }
}

impl TestListener for MockContext {
    fn before_test(&self) {
        self.reset_scenario();
    }
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.scenario.reset();
    }
}
