//! Bus configuration.
//!
//! A [`BusConfig`] fixes the queue capacity and worker count for the
//! lifetime of a bus. It can be built in code or loaded from a TOML or JSON
//! file; missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// What a worker does when a handler panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicPolicy {
    /// Catch the panic, log it and keep dispatching.
    #[default]
    Contain,
    /// Let the panic unwind and terminate the worker thread.
    Propagate,
}

impl std::fmt::Display for PanicPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contain => write!(f, "contain"),
            Self::Propagate => write!(f, "propagate"),
        }
    }
}

/// Construction parameters of a [`Bus`](crate::Bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Number of events the queue holds before publishers block
    pub queue_capacity: usize,
    /// Number of worker threads draining the queue
    pub workers: usize,
    /// Worker threads are named `{prefix}-{n}`, starting at 1
    pub thread_name_prefix: String,
    /// Handling of handler panics
    pub panic_policy: PanicPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 4,
            thread_name_prefix: "typebus-worker".to_string(),
            panic_policy: PanicPolicy::Contain,
        }
    }
}

impl BusConfig {
    /// Configuration with the given capacity and worker count, defaults otherwise.
    pub fn new(queue_capacity: usize, workers: usize) -> Self {
        Self {
            queue_capacity,
            workers,
            ..Default::default()
        }
    }

    /// Set the panic policy.
    pub fn with_panic_policy(mut self, panic_policy: PanicPolicy) -> Self {
        self.panic_policy = panic_policy;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Check that capacity and worker count are positive.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let content = std::fs::read_to_string(path)?;
        let config = match extension.as_str() {
            "toml" => Self::from_toml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        tracing::debug!(path = %path.display(), ?config, "Loaded bus configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.workers, 4);
        assert_eq!(config.panic_policy, PanicPolicy::Contain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(matches!(
            BusConfig::new(0, 2).validate(),
            Err(ConfigError::ZeroCapacity)
        ));
        assert!(matches!(
            BusConfig::new(10, 0).validate(),
            Err(ConfigError::ZeroWorkers)
        ));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = BusConfig::from_toml_str(
            r#"
            queue_capacity = 10
            panic_policy = "propagate"
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.workers, 4);
        assert_eq!(config.panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = BusConfig::from_json_str(r#"{ "workers": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroWorkers));

        let err = BusConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");

        let toml_path = dir.path().join("bus.toml");
        let mut file = std::fs::File::create(&toml_path).expect("create");
        writeln!(file, "workers = 2\nthread_name_prefix = \"dispatch\"").expect("write");
        let config = BusConfig::load(&toml_path).expect("load toml");
        assert_eq!(config.workers, 2);
        assert_eq!(config.thread_name_prefix, "dispatch");

        let json_path = dir.path().join("bus.json");
        std::fs::write(&json_path, r#"{ "queue_capacity": 3 }"#).expect("write");
        assert_eq!(BusConfig::load(&json_path).expect("load json").queue_capacity, 3);

        let yaml_path = dir.path().join("bus.yaml");
        std::fs::write(&yaml_path, "workers: 2").expect("write");
        assert!(matches!(
            BusConfig::load(&yaml_path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));

        assert!(matches!(
            BusConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_panic_policy_display() {
        assert_eq!(PanicPolicy::Contain.to_string(), "contain");
        assert_eq!(PanicPolicy::Propagate.to_string(), "propagate");
    }
}
