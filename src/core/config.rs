//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{MockError, Result};

/// Full scenario_mock configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MockConfig {
    pub defaults: DefaultsConfig,
    pub snapshot: SnapshotConfig,
    pub report: ReportConfig,
    pub trace: TraceConfig,
}

/// Stub defaults for calls no definition matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DefaultsConfig {
    pub string_default: StringDefault,
}

/// What an unconfigured string-returning method yields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StringDefault {
    /// `Value::Str("")`.
    #[default]
    Empty,
    /// `Value::Null`.
    Null,
}

impl FromStr for StringDefault {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "null" => Ok(Self::Null),
            other => Err(format!("expected \"empty\" or \"null\", got {other:?}")),
        }
    }
}

impl fmt::Display for StringDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// Argument snapshot limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Nesting depth beyond which the live reference is kept instead of a copy.
    pub max_depth: usize,
}

/// Scenario report rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Attach the full scenario report to assertion failures.
    pub include_in_failures: bool,
    /// Maximum records rendered in a report; 0 means unlimited.
    pub max_invocations: usize,
    /// Render the caller location of every record.
    pub show_locations: bool,
}

/// JSONL trace log of mock activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_in_failures: true,
            max_invocations: 0,
            show_locations: true,
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        let target_dir = env::var_os("CARGO_TARGET_DIR").map_or_else(
            || PathBuf::from("target"),
            PathBuf::from,
        );
        Self {
            enabled: false,
            jsonl_path: target_dir.join("scenario_mock").join("trace.jsonl"),
            fallback_path: None,
        }
    }
}

impl MockConfig {
    /// Default configuration path: `$SCM_CONFIG`, else `scenario_mock.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env_var("SCM_CONFIG").map_or_else(|| PathBuf::from("scenario_mock.toml"), PathBuf::from)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| MockError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if is_explicit_path {
            return Err(MockError::MissingConfig { path: path_buf });
        } else {
            if env_var("SCM_CONFIG").is_some() {
                eprintln!(
                    "[SCM-CONFIG] WARNING: SCM_CONFIG names {} which does not exist, using defaults",
                    path_buf.display()
                );
            }
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut parsed: Self = toml::from_str(raw)?;
        // An empty string in TOML means "no fallback".
        if parsed
            .trace
            .fallback_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            parsed.trace.fallback_path = None;
        }
        Ok(parsed)
    }

    /// Deterministic hash of the effective config, stamped on `mock_created`
    /// trace entries so traces from different settings can be told apart.
    ///
    /// FNV-1a over the JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;
        let hash = serde_json::to_vec(self)?
            .into_iter()
            .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("SCM_DEFAULTS_STRING_DEFAULT") {
            self.defaults.string_default = parse_env("SCM_DEFAULTS_STRING_DEFAULT", &raw)?;
        }
        if let Some(raw) = lookup("SCM_SNAPSHOT_MAX_DEPTH") {
            self.snapshot.max_depth = parse_env("SCM_SNAPSHOT_MAX_DEPTH", &raw)?;
        }
        if let Some(raw) = lookup("SCM_REPORT_INCLUDE_IN_FAILURES") {
            self.report.include_in_failures = parse_env("SCM_REPORT_INCLUDE_IN_FAILURES", &raw)?;
        }
        if let Some(raw) = lookup("SCM_REPORT_MAX_INVOCATIONS") {
            self.report.max_invocations = parse_env("SCM_REPORT_MAX_INVOCATIONS", &raw)?;
        }
        if let Some(raw) = lookup("SCM_REPORT_SHOW_LOCATIONS") {
            self.report.show_locations = parse_env("SCM_REPORT_SHOW_LOCATIONS", &raw)?;
        }
        if let Some(raw) = lookup("SCM_TRACE_ENABLED") {
            self.trace.enabled = parse_env("SCM_TRACE_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("SCM_TRACE_JSONL_PATH") {
            self.trace.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SCM_TRACE_FALLBACK_PATH") {
            self.trace.fallback_path = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.snapshot.max_depth == 0 {
            return Err(MockError::InvalidConfig {
                details: "snapshot.max_depth must be >= 1".to_string(),
            });
        }

        if self.trace.enabled && self.trace.jsonl_path.as_os_str().is_empty() {
            return Err(MockError::InvalidConfig {
                details: "trace.jsonl_path must be set when trace.enabled=true".to_string(),
            });
        }

        if let Some(fallback) = &self.trace.fallback_path
            && fallback == &self.trace.jsonl_path
        {
            return Err(MockError::InvalidConfig {
                details: format!(
                    "trace.fallback_path must differ from trace.jsonl_path ({})",
                    fallback.display()
                ),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| MockError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{MockConfig, MockError, StringDefault};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = MockConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.defaults.string_default, StringDefault::Empty);
        assert!(!cfg.trace.enabled);
    }

    #[test]
    fn zero_snapshot_depth_rejected() {
        let mut cfg = MockConfig::default();
        cfg.snapshot.max_depth = 0;
        let err = cfg.validate().expect_err("expected invalid depth");
        match err {
            MockError::InvalidConfig { details } => assert!(details.contains("max_depth")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fallback_equal_to_primary_rejected() {
        let mut cfg = MockConfig::default();
        cfg.trace.fallback_path = Some(cfg.trace.jsonl_path.clone());
        let err = cfg.validate().expect_err("expected fallback validation error");
        assert!(err.to_string().contains("fallback_path"));
    }

    #[test]
    fn toml_sections_parse() {
        let cfg = MockConfig::from_toml_str(
            r#"
            [defaults]
            string_default = "null"

            [report]
            max_invocations = 10
            show_locations = false

            [trace]
            enabled = true
            jsonl_path = "/tmp/scm.jsonl"
            fallback_path = ""
            "#,
        )
        .expect("valid toml");
        assert_eq!(cfg.defaults.string_default, StringDefault::Null);
        assert_eq!(cfg.report.max_invocations, 10);
        assert!(!cfg.report.show_locations);
        assert!(cfg.report.include_in_failures);
        assert!(cfg.trace.enabled);
        assert_eq!(cfg.trace.jsonl_path, PathBuf::from("/tmp/scm.jsonl"));
        assert_eq!(cfg.trace.fallback_path, None);
        assert_eq!(cfg.snapshot.max_depth, 32);
    }

    #[test]
    fn bad_toml_is_config_parse_error() {
        let err = MockConfig::from_toml_str("[defaults]\nstring_default = \"zero\"")
            .expect_err("unknown variant");
        assert_eq!(err.code(), "SCM-1003");
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = MockConfig::default();
        let overrides = vars(&[
            ("SCM_DEFAULTS_STRING_DEFAULT", "NULL"),
            ("SCM_SNAPSHOT_MAX_DEPTH", "4"),
            ("SCM_REPORT_INCLUDE_IN_FAILURES", "false"),
            ("SCM_TRACE_ENABLED", "true"),
            ("SCM_TRACE_JSONL_PATH", "/tmp/x.jsonl"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides parse");
        assert_eq!(cfg.defaults.string_default, StringDefault::Null);
        assert_eq!(cfg.snapshot.max_depth, 4);
        assert!(!cfg.report.include_in_failures);
        assert!(cfg.trace.enabled);
        assert_eq!(cfg.trace.jsonl_path, PathBuf::from("/tmp/x.jsonl"));
    }

    #[test]
    fn env_override_parse_failure_names_variable() {
        let mut cfg = MockConfig::default();
        let overrides = vars(&[("SCM_SNAPSHOT_MAX_DEPTH", "deep")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("not a number");
        assert!(err.to_string().contains("SCM_SNAPSHOT_MAX_DEPTH"));
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let err = MockConfig::load(Some(Path::new("/nonexistent_scm_dir/cfg.toml")))
            .expect_err("missing explicit config");
        assert_eq!(err.code(), "SCM-1002");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario_mock.toml");
        std::fs::write(&path, "[snapshot]\nmax_depth = 7\n").unwrap();
        let cfg = MockConfig::load(Some(path.as_path())).expect("loads");
        assert_eq!(cfg.snapshot.max_depth, 7);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = MockConfig::default();
        let hash_before = cfg.stable_hash().expect("hash should compute");
        let mut modified = MockConfig::default();
        modified.snapshot.max_depth += 1;
        let hash_after = modified.stable_hash().expect("hash should compute");
        assert_ne!(hash_before, hash_after);
        assert_eq!(hash_before, MockConfig::default().stable_hash().unwrap());
    }
}
