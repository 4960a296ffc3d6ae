//! Adapter configuration read from `maze-lab.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use maze_lab_system_execution::ExecutionLimits;
use maze_lab_system_session::SessionConfig;
use serde::Deserialize;
use thiserror::Error;

/// File consulted when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "maze-lab.toml";

/// Settings shared by every subcommand. Missing fields take their defaults.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LabConfig {
    /// Milliseconds between two moves when playing a session.
    pub(crate) move_delay_ms: u64,
    /// Instructions a run may execute before it is stopped.
    pub(crate) instruction_budget: u64,
    /// Deepest permitted nesting of user function calls.
    pub(crate) max_call_depth: usize,
    /// Fixed maze seed; absent means a fresh seed per invocation.
    pub(crate) seed: Option<u64>,
    /// File holding the persisted level counter.
    pub(crate) level_file: PathBuf,
}

impl Default for LabConfig {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            move_delay_ms: 100,
            instruction_budget: limits.instruction_budget,
            max_call_depth: limits.max_call_depth,
            seed: None,
            level_file: PathBuf::from(".maze-lab-level"),
        }
    }
}

/// Reasons a configuration is rejected after parsing.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub(crate) enum ConfigError {
    #[error("move_delay_ms must be > 0")]
    ZeroDelay,
    #[error("instruction_budget must be > 0")]
    ZeroBudget,
    #[error("max_call_depth must be > 0")]
    ZeroCallDepth,
    #[error("level_file must not be empty")]
    EmptyLevelFile,
}

impl LabConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.move_delay_ms == 0 {
            return Err(ConfigError::ZeroDelay);
        }
        if self.instruction_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::ZeroCallDepth);
        }
        if self.level_file.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLevelFile);
        }
        Ok(())
    }

    pub(crate) fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            instruction_budget: self.instruction_budget,
            max_call_depth: self.max_call_depth,
        }
    }

    pub(crate) fn session(&self) -> SessionConfig {
        SessionConfig {
            move_delay: Duration::from_millis(self.move_delay_ms),
            limits: self.limits(),
            seed: self.seed,
        }
    }
}

/// Loads and validates the configuration at `path`.
///
/// A missing file yields [`LabConfig::default`].
pub(crate) fn load_config(path: &Path) -> Result<LabConfig> {
    if !path.exists() {
        return Ok(LabConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: LabConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(config, LabConfig::default());
        assert_eq!(config.limits(), ExecutionLimits::default());
    }

    #[test]
    fn partial_files_keep_remaining_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("maze-lab.toml");
        fs::write(&path, "move_delay_ms = 40\nseed = 9\n").expect("write");

        let config = load_config(&path).expect("load");

        assert_eq!(config.move_delay_ms, 40);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.instruction_budget, 5_000_000);
        assert_eq!(config.session().move_delay, Duration::from_millis(40));
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("maze-lab.toml");
        fs::write(&path, "instruction_budget = 0\n").expect("write");

        let error = load_config(&path).expect_err("zero budget");

        assert_eq!(
            error.root_cause().to_string(),
            ConfigError::ZeroBudget.to_string()
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("maze-lab.toml");
        fs::write(&path, "move_delay = 10\n").expect("write");

        assert!(load_config(&path).is_err());
    }
}
