use std::path::PathBuf;
use std::time::Duration;

use crate::core::evaluator::{DanglingPolicy, EvaluationOptions};
use crate::core::ServiceSettings;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// How long SQLite waits on a locked database before reporting busy
    pub busy_timeout: Duration,
    pub max_write_attempts: u32,
    pub dangling_policy: DanglingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            max_write_attempts: ServiceSettings::default().max_write_attempts,
            dangling_policy: DanglingPolicy::default(),
        }
    }
}

impl Config {
    /// Defaults, then environment, then the `--db` flag.
    pub fn load(db_override: Option<PathBuf>) -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config);
        if let Some(path) = db_override {
            config.db_path = path;
        }
        config
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            max_write_attempts: self.max_write_attempts,
            evaluation: EvaluationOptions {
                dangling: self.dangling_policy,
            },
        }
    }
}

/// `$CWD/.taskgraph/graph.db`
pub fn default_db_path() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join(".taskgraph").join("graph.db")
}

pub fn apply_env_overrides(config: &mut Config) {
    apply_env_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_env_overrides_from<F>(config: &mut Config, mut lookup: F)
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup("TASKGRAPH_DB_PATH") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.db_path = PathBuf::from(trimmed);
        }
    }

    if let Some(raw) = lookup("TASKGRAPH_BUSY_TIMEOUT_MS") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<u64>() {
                Ok(ms) => config.busy_timeout = Duration::from_millis(ms),
                Err(err) => {
                    tracing::warn!("invalid TASKGRAPH_BUSY_TIMEOUT_MS, ignoring: {err}");
                }
            }
        }
    }

    if let Some(raw) = lookup("TASKGRAPH_MAX_WRITE_ATTEMPTS") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<u32>() {
                Ok(0) => {
                    tracing::warn!("TASKGRAPH_MAX_WRITE_ATTEMPTS must be at least 1, ignoring");
                }
                Ok(value) => config.max_write_attempts = value,
                Err(err) => {
                    tracing::warn!("invalid TASKGRAPH_MAX_WRITE_ATTEMPTS, ignoring: {err}");
                }
            }
        }
    }

    if let Some(raw) = lookup("TASKGRAPH_DANGLING") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<DanglingPolicy>() {
                Ok(policy) => config.dangling_policy = policy,
                Err(err) => {
                    tracing::warn!("invalid TASKGRAPH_DANGLING, ignoring: {err}");
                }
            }
        }
    }
}
