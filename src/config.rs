/*!
 * Configuration types for Breakwater
 *
 * A host process describes its logging and per-dependency breaker settings in
 * one TOML file:
 *
 * ```toml
 * [logging]
 * level = "info"
 *
 * [breakers.soap]
 * failure_threshold = 2
 * recovery_timeout_ms = 60000
 * timeout_ms = 15000
 * ```
 */

use crate::error::{BreakwaterError, Result};
use crate::services::Dependency;
use breakwater_core_resilience::{CircuitBreakerConfig, CircuitBreakerOverrides};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakwaterConfig {
    /// Diagnostic output settings
    pub logging: LoggingConfig,

    /// Per-breaker overrides keyed by breaker name
    pub breakers: BTreeMap<String, CircuitBreakerOverrides>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level emitted
    pub level: LogLevel,

    /// Log file path (None = stdout)
    pub file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for level = debug)
    pub verbose: bool,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl BreakwaterConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| BreakwaterError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: BreakwaterConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every breaker section resolves to a usable configuration
    pub fn validate(&self) -> Result<()> {
        for name in self.breakers.keys() {
            self.breaker_config(name)?;
        }
        Ok(())
    }

    /// Overrides for `name`, layered over the built-in settings of a known
    /// dependency when there is one
    pub fn overrides_for(&self, name: &str) -> CircuitBreakerOverrides {
        let configured = self.breakers.get(name).copied().unwrap_or_default();
        match Dependency::from_name(name) {
            Some(dependency) => configured.merged_over(dependency.default_overrides()),
            None => configured,
        }
    }

    /// Resolved breaker configuration for `name`
    pub fn breaker_config(&self, name: &str) -> Result<CircuitBreakerConfig> {
        self.overrides_for(name)
            .into_config()
            .map_err(|source| BreakwaterError::Breaker {
                name: name.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BreakwaterConfig::from_toml_str("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.logging.file.is_none());
        assert!(config.breakers.is_empty());
    }

    #[test]
    fn test_parse_breaker_sections() {
        let toml_str = r#"
            [logging]
            level = "debug"

            [breakers.payments]
            failure_threshold = 7
            timeout_ms = 0

            [breakers.soap]
            recovery_timeout_ms = 90000
        "#;
        let config = BreakwaterConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);

        let payments = config.breaker_config("payments").unwrap();
        assert_eq!(payments.failure_threshold, 7);
        assert_eq!(payments.recovery_timeout, Duration::from_secs(30));
        assert_eq!(payments.timeout, None);

        // Known dependency keeps its own defaults for fields not overridden
        let soap = config.breaker_config("soap").unwrap();
        assert_eq!(soap.failure_threshold, 2);
        assert_eq!(soap.recovery_timeout, Duration::from_secs(90));
        assert_eq!(soap.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_unknown_breaker_field_rejected() {
        let toml_str = r#"
            [breakers.database]
            failure_treshold = 3
        "#;
        let err = BreakwaterConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, BreakwaterError::ConfigParse(_)));
    }

    #[test]
    fn test_unknown_logging_key_rejected() {
        let toml_str = r#"
            [logging]
            level = "debug"
            json = true
        "#;
        let err = BreakwaterConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, BreakwaterError::ConfigParse(_)));
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = BreakwaterConfig::from_toml_str("[breaker.soap]\nfailure_threshold = 2")
            .unwrap_err();
        assert!(matches!(err, BreakwaterError::ConfigParse(_)));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let toml_str = r#"
            [breakers.messaging]
            failure_threshold = 0
        "#;
        let err = BreakwaterConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, BreakwaterError::Breaker { ref name, .. } if name == "messaging"));
    }

    #[test]
    fn test_missing_file() {
        let err = BreakwaterConfig::from_file(Path::new("/nonexistent/breakwater.toml"))
            .unwrap_err();
        assert!(matches!(err, BreakwaterError::ConfigRead { .. }));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut config = BreakwaterConfig::default();
        config.breakers.insert(
            "database".to_string(),
            CircuitBreakerOverrides::default().failure_threshold(4),
        );
        let toml = toml::to_string(&config).unwrap();
        let deserialized: BreakwaterConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
