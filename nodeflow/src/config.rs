//! Engine configuration.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};

fn default_max_concurrent_nodes() -> usize {
    16
}

fn default_advising_queue_capacity() -> usize {
    1024
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Configuration of a node execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Node work allowed to run at once.
    #[serde(default = "default_max_concurrent_nodes")]
    pub max_concurrent_nodes: usize,
    /// Capacity of the asynchronous advising queue.
    #[serde(default = "default_advising_queue_capacity")]
    pub advising_queue_capacity: usize,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: default_max_concurrent_nodes(),
            advising_queue_capacity: default_advising_queue_capacity(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrent_nodes(mut self, max: usize) -> Self {
        self.max_concurrent_nodes = max;
        self
    }

    /// Sets the advising queue capacity.
    #[must_use]
    pub fn with_advising_queue_capacity(mut self, capacity: usize) -> Self {
        self.advising_queue_capacity = capacity;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Rejects sizes of zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_concurrent_nodes == 0 {
            return Err(EngineError::Config("max_concurrent_nodes must be at least 1".into()));
        }
        if self.advising_queue_capacity == 0 {
            return Err(EngineError::Config("advising_queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_nodes, 16);
        assert_eq!(config.advising_queue_capacity, 1024);
        assert_eq!(config.log.filter, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{"max_concurrent_nodes": 4, "log": {"json": true}}"#).unwrap();
        assert_eq!(
            config,
            EngineConfig::default()
                .with_max_concurrent_nodes(4)
                .with_log(LogConfig {
                    filter: "info".into(),
                    json: true,
                })
        );
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(matches!(
            EngineConfig::default().with_max_concurrent_nodes(0).validate(),
            Err(EngineError::Config(_))
        ));
        assert!(EngineConfig::from_json(r#"{"advising_queue_capacity": 0}"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
