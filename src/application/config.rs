//! Solver configuration.
//!
//! Backend choice and tuning can be loaded from TOML instead of being wired
//! in code:
//!
//! ```
//! use mipbridge::{Preference, SolverConfig};
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     backend = "coin_cbc"
//!     time_limit = 30.0
//!     gap_tolerance = 0.01
//!
//!     [logging]
//!     level = "debug"
//! "#).unwrap();
//!
//! assert_eq!(config.backend, Preference::CoinCbc);
//! assert_eq!(config.time_limit, Some(30.0));
//! ```

use crate::domain::{Preference, SolverBackend};
use crate::infrastructure::logging::LoggingConfig;
use crate::solver::{default_search_dir, SolverFactory};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the solver
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Engine to resolve, or `any` for the first available one.
    pub backend: Preference,
    /// Directory searched for backend modules. Defaults to
    /// [`default_search_dir`].
    pub search_dir: Option<PathBuf>,
    /// Time limit in seconds.
    pub time_limit: Option<f64>,
    /// Optimality gap at which the engine may stop.
    pub gap_tolerance: Option<f64>,
    /// Interpret `gap_tolerance` as an absolute rather than relative gap.
    pub absolute_gap: bool,
    pub num_threads: Option<u32>,
    pub verbose: bool,
    pub logging: LoggingConfig,
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, contains invalid TOML or
    /// fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_toml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_backend(mut self, backend: Preference) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = Some(dir.into());
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    pub fn with_gap(mut self, gap: f64, absolute: bool) -> Self {
        self.gap_tolerance = Some(gap);
        self.absolute_gap = absolute;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limit) = self.time_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "time_limit must be a non-negative number of seconds, got {}",
                    limit
                )));
            }
        }
        if let Some(gap) = self.gap_tolerance {
            if !gap.is_finite() || gap < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "gap_tolerance must be non-negative, got {}",
                    gap
                )));
            }
        }
        Ok(())
    }

    /// Directory the factory searches for backend modules.
    pub fn resolved_search_dir(&self) -> PathBuf {
        self.search_dir.clone().unwrap_or_else(default_search_dir)
    }

    /// Builtin factory pointed at [`resolved_search_dir`](Self::resolved_search_dir).
    pub fn factory(&self) -> SolverFactory {
        SolverFactory::builtin().with_search_dir(self.resolved_search_dir())
    }

    /// Issue the configured tuning calls on `backend`.
    pub fn apply(&self, backend: &mut dyn SolverBackend) {
        if let Some(limit) = self.time_limit {
            backend.set_timeout(limit);
        }
        if let Some(gap) = self.gap_tolerance {
            backend.set_optimality_gap(gap, self.absolute_gap);
        }
        if let Some(threads) = self.num_threads {
            backend.set_num_threads(threads);
        }
        backend.set_verbose(self.verbose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_keys_missing() {
        let config = SolverConfig::from_toml_str("").unwrap();
        assert_eq!(config, SolverConfig::default());
        assert_eq!(config.backend, Preference::Any);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn full_toml_parsing() {
        let config = SolverConfig::from_toml_str(
            r#"
            backend = "highs"
            search_dir = "/opt/mipbridge/backends"
            time_limit = 12.5
            gap_tolerance = 1.0
            absolute_gap = true
            num_threads = 4
            verbose = true

            [logging]
            level = "warn"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Preference::Highs);
        assert_eq!(
            config.resolved_search_dir(),
            PathBuf::from("/opt/mipbridge/backends")
        );
        assert_eq!(config.time_limit, Some(12.5));
        assert!(config.absolute_gap);
        assert_eq!(config.num_threads, Some(4));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = SolverConfig::from_toml_str(r#"backend = "cplex""#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn negative_limits_are_invalid() {
        assert!(SolverConfig::new().with_time_limit(-1.0).validate().is_err());
        assert!(SolverConfig::new().with_gap(f64::NAN, false).validate().is_err());
        assert!(SolverConfig::new().with_time_limit(0.0).validate().is_ok());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"coin_cbc\"\ntime_limit = -3.0").unwrap();
        assert!(matches!(
            SolverConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"coin_cbc\"\ntime_limit = 3.0").unwrap();
        let config = SolverConfig::load(file.path()).unwrap();
        assert_eq!(config.backend, Preference::CoinCbc);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SolverConfig::load(dir.path().join("solver.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
