//! The scenario ledger: ordered invocation history shared by every mock of a
//! test, plus the verification queries run against it.
//!
//! Records are appended in the exact order calls were intercepted and never
//! reordered. Beside the records the ledger keeps a verified flag per record
//! and a single forward-only cursor for in-sequence assertions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::core::config::MockConfig;
use crate::core::errors::{AssertionKind, MockError, Result};
use crate::invocation::matcher::InvocationShape;
use crate::invocation::record::{InvocationRecord, ProxyInvocation};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::mock::object::{Mock, MockId, MockInner};
use crate::scenario::report;

/// Shared, ordered invocation history for one test.
///
/// Cloning a `Scenario` yields another handle to the same ledger.
#[derive(Clone)]
pub struct Scenario {
    shared: Arc<ScenarioShared>,
}

struct ScenarioShared {
    ledger: Mutex<Ledger>,
    mocks: Mutex<Vec<Weak<MockInner>>>,
    next_mock_id: AtomicU64,
    config: Arc<MockConfig>,
    config_hash: String,
    trace: Option<Mutex<JsonlWriter>>,
}

/// Records, verified flags and the sequence cursor, guarded together.
pub(crate) struct Ledger {
    records: Vec<InvocationRecord>,
    verified: Vec<bool>,
    cursor: usize,
}

impl Ledger {
    /// Seal `invocation` as the next record and return a handle to it.
    pub(crate) fn append(&mut self, invocation: ProxyInvocation, outcome: String) -> &InvocationRecord {
        let sequence = self.records.len() as u64 + 1;
        self.records.push(invocation.seal(sequence, outcome));
        self.verified.push(false);
        &self.records[self.records.len() - 1]
    }

    /// Indices of records made on any of `mocks` that `shape` matches.
    fn matching<'a>(
        &'a self,
        mocks: &'a [Mock],
        shape: &'a InvocationShape,
    ) -> impl Iterator<Item = usize> + 'a {
        self.records
            .iter()
            .enumerate()
            .filter(move |(_, r)| {
                mocks.iter().any(|m| m.id() == r.mock_id())
                    && shape.matches(r.method(), r.arguments(), r.snapshot())
            })
            .map(|(i, _)| i)
    }
}

/// What an assertion was looking for, rendered for failures.
struct Expectation<'a> {
    mocks: &'a [Mock],
    shape: &'a InvocationShape,
}

impl Expectation<'_> {
    /// Mocks reached through one chain step share a name.
    fn name(&self) -> &str {
        self.mocks.first().map_or("", Mock::name)
    }

    fn covers(&self, record: &InvocationRecord) -> bool {
        self.mocks.iter().any(|m| m.id() == record.mock_id())
    }

    fn text(&self) -> String {
        format!(
            "{}.{}{}",
            self.name(),
            self.shape.method().name(),
            self.shape.matcher_key()
        )
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("invocations", &self.len())
            .field("cursor", &self.cursor())
            .finish_non_exhaustive()
    }
}

impl Scenario {
    /// Empty scenario. Opens the trace log when tracing is enabled.
    #[must_use]
    pub fn new(config: Arc<MockConfig>) -> Self {
        let trace = config
            .trace
            .enabled
            .then(|| Mutex::new(JsonlWriter::open(JsonlConfig::from(&config.trace))));
        let config_hash = config.stable_hash().unwrap_or_default();
        Self {
            shared: Arc::new(ScenarioShared {
                ledger: Mutex::new(Ledger {
                    records: Vec::new(),
                    verified: Vec::new(),
                    cursor: 0,
                }),
                mocks: Mutex::new(Vec::new()),
                next_mock_id: AtomicU64::new(1),
                config,
                config_hash,
                trace,
            }),
        }
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &MockConfig {
        &self.shared.config
    }

    pub(crate) fn config_arc(&self) -> Arc<MockConfig> {
        Arc::clone(&self.shared.config)
    }

    /// [`MockConfig::stable_hash`] of the effective configuration.
    #[must_use]
    pub fn config_hash(&self) -> &str {
        &self.shared.config_hash
    }

    /// Number of recorded invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ledger.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current position of the in-sequence cursor.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.shared.ledger.lock().cursor
    }

    /// Copy of the full history, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<InvocationRecord> {
        self.shared.ledger.lock().records.clone()
    }

    /// Records made on one mock, in call order.
    #[must_use]
    pub fn invocations_of(&self, mock: &Mock) -> Vec<InvocationRecord> {
        self.shared
            .ledger
            .lock()
            .records
            .iter()
            .filter(|r| r.mock_id() == mock.id())
            .cloned()
            .collect()
    }

    /// Whether two handles refer to the same ledger.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ──────────────────── assertions ────────────────────

    /// Passes if any record matches; marks the first unverified match verified.
    pub fn assert_invoked(&self, mock: &Mock, shape: &InvocationShape) -> Result<()> {
        self.assert_invoked_on(std::slice::from_ref(mock), shape)
    }

    /// Passes if no record matches.
    pub fn assert_not_invoked(&self, mock: &Mock, shape: &InvocationShape) -> Result<()> {
        self.assert_not_invoked_on(std::slice::from_ref(mock), shape)
    }

    /// Passes if a match exists at or after the cursor; the cursor then moves
    /// past it.
    pub fn assert_invoked_in_sequence(&self, mock: &Mock, shape: &InvocationShape) -> Result<()> {
        self.assert_invoked_in_sequence_on(std::slice::from_ref(mock), shape)
    }

    /// [`Self::assert_invoked`] over records made on any of `mocks`.
    pub(crate) fn assert_invoked_on(&self, mocks: &[Mock], shape: &InvocationShape) -> Result<()> {
        let mut ledger = self.shared.ledger.lock();
        let matches: Vec<usize> = ledger.matching(mocks, shape).collect();
        if matches.is_empty() {
            let expected = Expectation { mocks, shape };
            let message = format!("no invocation of {} was recorded", expected.text());
            return Err(self.failure(&ledger, AssertionKind::Invoked, message, &expected));
        }
        if let Some(&index) = matches.iter().find(|&&i| !ledger.verified[i]) {
            ledger.verified[index] = true;
        }
        Ok(())
    }

    pub(crate) fn assert_not_invoked_on(&self, mocks: &[Mock], shape: &InvocationShape) -> Result<()> {
        let ledger = self.shared.ledger.lock();
        let matches: Vec<&InvocationRecord> = ledger
            .matching(mocks, shape)
            .map(|i| &ledger.records[i])
            .collect();
        if matches.is_empty() {
            return Ok(());
        }
        let expected = Expectation { mocks, shape };
        let message = format!(
            "{} was invoked {} time(s), first as invocation {}",
            expected.text(),
            matches.len(),
            matches[0].sequence()
        );
        Err(self.failure(&ledger, AssertionKind::NotInvoked, message, &expected))
    }

    /// Takes the earliest match at or after the cursor across all of `mocks`.
    pub(crate) fn assert_invoked_in_sequence_on(
        &self,
        mocks: &[Mock],
        shape: &InvocationShape,
    ) -> Result<()> {
        let mut ledger = self.shared.ledger.lock();
        let cursor = ledger.cursor;
        let next = ledger.matching(mocks, shape).find(|&i| i >= cursor);
        if let Some(index) = next {
            ledger.cursor = index + 1;
            ledger.verified[index] = true;
            return Ok(());
        }

        let expected = Expectation { mocks, shape };
        let earlier = ledger.matching(mocks, shape).next();
        let message = match earlier {
            Some(index) => format!(
                "{} was invoked out of sequence: invocation {} precedes the last verified invocation {}",
                expected.text(),
                ledger.records[index].sequence(),
                cursor
            ),
            None => format!("no invocation of {} was recorded", expected.text()),
        };
        Err(self.failure(&ledger, AssertionKind::InvokedInSequence, message, &expected))
    }

    /// Fails if any record was not verified by an earlier assertion.
    pub fn assert_no_more_invocations(&self) -> Result<()> {
        let ledger = self.shared.ledger.lock();
        let unverified: Vec<&InvocationRecord> = ledger
            .records
            .iter()
            .zip(&ledger.verified)
            .filter(|(_, verified)| !**verified)
            .map(|(r, _)| r)
            .collect();
        if unverified.is_empty() {
            return Ok(());
        }
        let report_config = &self.shared.config.report;
        let error = MockError::AssertionFailed {
            kind: AssertionKind::NoMoreInvocations,
            message: format!("{} invocation(s) were not verified", unverified.len()),
            expected: "no unverified invocations".to_string(),
            closest: report::render_block("Unverified", &unverified, report_config.show_locations),
            report: self.failure_report(&ledger),
        };
        drop(ledger);
        self.trace_failure(&error);
        Err(error)
    }

    /// Full transcript of the history. Does not modify the scenario.
    #[must_use]
    pub fn create_report(&self) -> String {
        let ledger = self.shared.ledger.lock();
        report::render(&ledger.records, &self.shared.config.report)
    }

    /// Clear history, verified flags and cursor, and make every one-shot
    /// definition of every mock in this scenario eligible again.
    pub fn reset(&self) {
        let mut ledger = self.shared.ledger.lock();
        let dropped = ledger.records.len();
        ledger.records.clear();
        ledger.verified.clear();
        ledger.cursor = 0;

        let live: Vec<Mock> = {
            let mut mocks = self.shared.mocks.lock();
            mocks.retain(|weak| weak.strong_count() > 0);
            mocks.iter().filter_map(Mock::upgrade).collect()
        };
        for mock in &live {
            mock.clear_used_flags();
        }
        drop(ledger);

        self.trace_with(|| {
            LogEntry::new(EventType::ScenarioReset, Severity::Info)
                .with_details(format!("dropped {dropped} invocation(s)"))
        });
    }

    // ──────────────────── crate internals ────────────────────

    /// Take the ledger lock. Callers that also lock a mock take this first.
    pub(crate) fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.shared.ledger.lock()
    }

    pub(crate) fn next_mock_id(&self) -> MockId {
        MockId(self.shared.next_mock_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, mock: &Mock) {
        self.shared.mocks.lock().push(mock.downgrade());
    }

    /// Write a trace entry; `build` only runs when tracing is enabled.
    pub(crate) fn trace_with(&self, build: impl FnOnce() -> LogEntry) {
        if let Some(trace) = &self.shared.trace {
            let entry = build();
            trace.lock().write_entry(&entry);
        }
    }

    fn failure_report(&self, ledger: &Ledger) -> String {
        if self.shared.config.report.include_in_failures {
            report::render(&ledger.records, &self.shared.config.report)
        } else {
            String::new()
        }
    }

    fn failure(
        &self,
        ledger: &Ledger,
        kind: AssertionKind,
        message: String,
        expected: &Expectation<'_>,
    ) -> MockError {
        let show_locations = self.shared.config.report.show_locations;
        let same_method: Vec<&InvocationRecord> = ledger
            .records
            .iter()
            .filter(|r| expected.covers(r) && r.method() == expected.shape.method())
            .collect();
        let closest = if same_method.is_empty() {
            let same_mock: Vec<&InvocationRecord> = ledger
                .records
                .iter()
                .filter(|r| expected.covers(r))
                .collect();
            if same_mock.is_empty() {
                format!("No invocations of {} were recorded.\n\n", expected.name())
            } else {
                report::render_block(
                    &format!("Other invocations of {}", expected.name()),
                    &same_mock,
                    show_locations,
                )
            }
        } else {
            report::render_block(
                &format!("Invocations of {}.{}", expected.name(), expected.shape.method().name()),
                &same_method,
                show_locations,
            )
        };
        let error = MockError::AssertionFailed {
            kind,
            message,
            expected: expected.text(),
            closest,
            report: self.failure_report(ledger),
        };
        self.trace_failure(&error);
        error
    }

    fn trace_failure(&self, error: &MockError) {
        self.trace_with(|| {
            let mut entry = LogEntry::new(EventType::AssertionFailed, Severity::Warning)
                .with_error_code(error.code());
            if let MockError::AssertionFailed { kind, message, expected, .. } = error {
                entry = entry
                    .with_method(expected.clone())
                    .with_details(format!("{kind}: {message}"));
            }
            entry
        });
    }
}
