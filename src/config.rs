//! Runtime configuration, loaded from an optional YAML file with serde
//! defaults. CLI flags override file values in `main`.

use crate::scheduler::SchedulerConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_tick_interval_ms() -> u64 {
    60_000
}

fn default_batch_size() -> usize {
    100
}

fn default_db_path() -> String {
    "chorewheel.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Delay between scheduler tick starts, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Max due tasks considered per tick.
    #[serde(default = "default_batch_size")]
    pub due_batch_size: usize,

    /// Max overdue instances swept per tick.
    #[serde(default = "default_batch_size")]
    pub overdue_batch_size: usize,

    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            due_batch_size: default_batch_size(),
            overdue_batch_size: default_batch_size(),
            db_path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load from a YAML file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            due_batch_size: self.due_batch_size,
            overdue_batch_size: self.overdue_batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = AppConfig::default();
        assert_eq!(config.tick_interval_ms, 60_000);
        assert_eq!(config.due_batch_size, 100);
        assert_eq!(config.overdue_batch_size, 100);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: AppConfig = serde_yaml::from_str("tick_interval_ms: 5000").unwrap();
        assert_eq!(config.tick_interval_ms, 5_000);
        assert_eq!(config.due_batch_size, 100);
        assert_eq!(config.db_path, "chorewheel.db");
    }

    #[test]
    fn scheduler_config_conversion() {
        let config: AppConfig = serde_yaml::from_str("tick_interval_ms: 1500").unwrap();
        let sched = config.scheduler();
        assert_eq!(sched.tick_interval, Duration::from_millis(1_500));
    }
}
