use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Scheduler sizing, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently running scheduling workers.
    #[serde(default = "default_core_threads")]
    pub core_threads: usize,
    /// Capacity of the execution pool shared by scheduling workers and
    /// immediate jobs.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// Pool threads are named `{prefix}@{index}`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_core_threads() -> usize { 16 }
fn default_max_threads() -> usize { 64 }
fn default_thread_name_prefix() -> String { "jobweave".to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            core_threads: default_core_threads(),
            max_threads: default_max_threads(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus env overrides (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// - `JOBWEAVE_CORE_THREADS` -> `core_threads`
    /// - `JOBWEAVE_MAX_THREADS` -> `max_threads`
    /// - `JOBWEAVE_THREAD_PREFIX` -> `thread_name_prefix`
    ///
    /// Unparseable numbers are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(n) = env_opt("JOBWEAVE_CORE_THREADS").and_then(|v| v.parse().ok()) {
            self.core_threads = n;
        }
        if let Some(n) = env_opt("JOBWEAVE_MAX_THREADS").and_then(|v| v.parse().ok()) {
            self.max_threads = n;
        }
        if let Some(prefix) = env_opt("JOBWEAVE_THREAD_PREFIX") {
            self.thread_name_prefix = prefix;
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.core_threads == 0 {
            return Err(SchedulerError::Config("core_threads must be at least 1".into()));
        }
        if self.max_threads < self.core_threads {
            return Err(SchedulerError::Config(format!(
                "max_threads ({}) must not be below core_threads ({})",
                self.max_threads, self.core_threads
            )));
        }
        Ok(())
    }

    /// Pool capacity left over for immediate jobs when every scheduling
    /// worker is busy.
    pub fn immediate_headroom(&self) -> usize {
        self.max_threads.saturating_sub(self.core_threads)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            core_threads = self.core_threads,
            max_threads = self.max_threads,
            thread_name_prefix = %self.thread_name_prefix,
            immediate_headroom = self.immediate_headroom(),
            "scheduler config loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.core_threads, 16);
        assert_eq!(config.max_threads, 64);
        assert_eq!(config.thread_name_prefix, "jobweave");
        assert_eq!(config.immediate_headroom(), 48);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let mut config: SchedulerConfig = toml::from_str("core_threads = 4").unwrap();
        assert_eq!(config.core_threads, 4);
        assert_eq!(config.max_threads, 64);

        config.max_threads = 8;
        assert_eq!(config.immediate_headroom(), 4);
    }

    #[test]
    fn rejects_zero_core_threads() {
        let config = SchedulerConfig { core_threads: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(SchedulerError::Config(_))));
    }

    #[test]
    fn rejects_max_below_core() {
        let config = SchedulerConfig { core_threads: 8, max_threads: 4, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_threads (4)"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = toml::from_str::<SchedulerConfig>("core_threads = \"many\"").unwrap_err();
        let err: SchedulerError = err.into();
        assert!(matches!(err, SchedulerError::ConfigParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "core_threads = 2\nmax_threads = 6\nthread_name_prefix = \"jobs\"").unwrap();

        let config = SchedulerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.core_threads, 2);
        assert_eq!(config.max_threads, 6);
        assert_eq!(config.thread_name_prefix, "jobs");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchedulerConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigIo(_)));
    }
}
