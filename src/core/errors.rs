//! SCM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MockError>;

/// Error payload carried by a configured `Fail` behavior.
pub type RaisedError = Arc<dyn std::error::Error + Send + Sync>;

/// Which assertion produced an [`MockError::AssertionFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    Invoked,
    NotInvoked,
    InvokedInSequence,
    NoMoreInvocations,
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invoked => write!(f, "assert_invoked"),
            Self::NotInvoked => write!(f, "assert_not_invoked"),
            Self::InvokedInSequence => write!(f, "assert_invoked_in_sequence"),
            Self::NoMoreInvocations => write!(f, "assert_no_more_invocations"),
        }
    }
}

/// Coarse grouping of errors by who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A defining statement or mock setup is malformed.
    Configuration,
    /// A `Fail` behavior deliberately raised its configured error.
    BehaviorFailure,
    /// Expected history did not match actual history.
    Assertion,
    /// Serialization or IO trouble outside the engine's algorithms.
    Internal,
}

/// Top-level error type for scenario_mock.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("[SCM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SCM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SCM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SCM-1101] unknown mock type {contract}: {details}")]
    UnknownContract { contract: String, details: String },

    #[error("[SCM-1102] duplicate method signature {signature}")]
    DuplicateSignature { signature: String },

    #[error("[SCM-1103] {contract} has no method {method} taking {arity} argument(s)")]
    UnknownMethod {
        contract: String,
        method: String,
        arity: usize,
    },

    #[error(
        "[SCM-1104] call to {contract}::{method} with {arity} argument(s) is ambiguous between: {candidates}"
    )]
    AmbiguousMethod {
        contract: String,
        method: String,
        arity: usize,
        candidates: String,
    },

    #[error("[SCM-1105] {method} expects {expected} argument matcher(s), got {actual}")]
    MatcherArity {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("[SCM-1106] invalid argument matcher: {details}")]
    InvalidMatcher { details: String },

    #[error("[SCM-1107] {method} returns {returns}, which cannot continue a chain")]
    NotMockable { method: String, returns: String },

    #[error("[SCM-1108] mock {mock} has no real implementation to pass through to")]
    NoRealImplementation { mock: String },

    #[error("[SCM-2001] {method} raised: {error}")]
    Raised { method: String, error: RaisedError },

    #[error("[SCM-3001] {kind} failed: {message}\n\nExpected: {expected}\n\n{closest}{report}")]
    AssertionFailed {
        kind: AssertionKind,
        message: String,
        expected: String,
        closest: String,
        report: String,
    },

    #[error("[SCM-3901] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SCM-3902] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MockError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SCM-1001",
            Self::MissingConfig { .. } => "SCM-1002",
            Self::ConfigParse { .. } => "SCM-1003",
            Self::UnknownContract { .. } => "SCM-1101",
            Self::DuplicateSignature { .. } => "SCM-1102",
            Self::UnknownMethod { .. } => "SCM-1103",
            Self::AmbiguousMethod { .. } => "SCM-1104",
            Self::MatcherArity { .. } => "SCM-1105",
            Self::InvalidMatcher { .. } => "SCM-1106",
            Self::NotMockable { .. } => "SCM-1107",
            Self::NoRealImplementation { .. } => "SCM-1108",
            Self::Raised { .. } => "SCM-2001",
            Self::AssertionFailed { .. } => "SCM-3001",
            Self::Serialization { .. } => "SCM-3901",
            Self::Io { .. } => "SCM-3902",
        }
    }

    /// Which part of the error taxonomy this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. }
            | Self::UnknownContract { .. }
            | Self::DuplicateSignature { .. }
            | Self::UnknownMethod { .. }
            | Self::AmbiguousMethod { .. }
            | Self::MatcherArity { .. }
            | Self::InvalidMatcher { .. }
            | Self::NotMockable { .. }
            | Self::NoRealImplementation { .. } => ErrorCategory::Configuration,
            Self::Raised { .. } => ErrorCategory::BehaviorFailure,
            Self::AssertionFailed { .. } => ErrorCategory::Assertion,
            Self::Serialization { .. } | Self::Io { .. } => ErrorCategory::Internal,
        }
    }

    /// The error a `Fail` behavior raised, if this is one.
    #[must_use]
    pub fn raised(&self) -> Option<&RaisedError> {
        match self {
            Self::Raised { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Downcast the raised error to a concrete type.
    #[must_use]
    pub fn raised_as<E: std::error::Error + Any + 'static>(&self) -> Option<&E> {
        self.raised().and_then(|error| error.downcast_ref::<E>())
    }

    /// Whether this is an assertion failure (as opposed to a setup mistake).
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailed { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Error raised by `fails_with` behaviors: a plain message standing in for a
/// collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SimulatedFailure {
    pub message: String,
}

impl SimulatedFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MockError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MockError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<regex::Error> for MockError {
    fn from(value: regex::Error) -> Self {
        Self::InvalidMatcher {
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<MockError> {
        vec![
            MockError::InvalidConfig {
                details: String::new(),
            },
            MockError::MissingConfig {
                path: PathBuf::new(),
            },
            MockError::ConfigParse {
                context: "",
                details: String::new(),
            },
            MockError::UnknownContract {
                contract: String::new(),
                details: String::new(),
            },
            MockError::DuplicateSignature {
                signature: String::new(),
            },
            MockError::UnknownMethod {
                contract: String::new(),
                method: String::new(),
                arity: 0,
            },
            MockError::AmbiguousMethod {
                contract: String::new(),
                method: String::new(),
                arity: 0,
                candidates: String::new(),
            },
            MockError::MatcherArity {
                method: String::new(),
                expected: 0,
                actual: 1,
            },
            MockError::InvalidMatcher {
                details: String::new(),
            },
            MockError::NotMockable {
                method: String::new(),
                returns: String::new(),
            },
            MockError::NoRealImplementation {
                mock: String::new(),
            },
            MockError::Raised {
                method: String::new(),
                error: Arc::new(SimulatedFailure::new("boom")),
            },
            MockError::AssertionFailed {
                kind: AssertionKind::Invoked,
                message: String::new(),
                expected: String::new(),
                closest: String::new(),
                report: String::new(),
            },
            MockError::Serialization {
                context: "",
                details: String::new(),
            },
            MockError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_errors();
        let codes: Vec<&str> = errors.iter().map(MockError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_display_includes_code() {
        for err in all_errors() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code {}: {msg}",
                err.code()
            );
        }
    }

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            MockError::MatcherArity {
                method: "m".to_string(),
                expected: 1,
                actual: 2,
            }
            .category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            MockError::Raised {
                method: "m".to_string(),
                error: Arc::new(SimulatedFailure::new("x")),
            }
            .category(),
            ErrorCategory::BehaviorFailure
        );
        assert!(
            MockError::AssertionFailed {
                kind: AssertionKind::NotInvoked,
                message: String::new(),
                expected: String::new(),
                closest: String::new(),
                report: String::new(),
            }
            .is_assertion()
        );
    }

    #[test]
    fn raised_error_can_be_downcast() {
        let err = MockError::Raised {
            method: "Repo::save(str)".to_string(),
            error: Arc::new(SimulatedFailure::new("disk full")),
        };
        let inner = err
            .raised_as::<SimulatedFailure>()
            .expect("should downcast");
        assert_eq!(inner.message, "disk full");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: MockError = json_err.into();
        assert_eq!(err.code(), "SCM-3901");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: MockError = toml_err.into();
        assert_eq!(err.code(), "SCM-1003");
    }

    #[test]
    fn from_regex_error() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: MockError = regex_err.into();
        assert_eq!(err.code(), "SCM-1106");
    }
}
