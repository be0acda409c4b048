//! Circuit breaker configuration
//!
//! [`CircuitBreakerConfig`] is the typed, fully-resolved form held by a breaker.
//! [`CircuitBreakerOverrides`] is the partial form callers and config files use;
//! any field left out falls back to the default.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed
    pub recovery_timeout: Duration,
    /// Per-operation deadline; `None` disables enforcement
    pub timeout: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: Duration::from_millis(DEFAULT_RECOVERY_TIMEOUT_MS),
            timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        }
    }
}

impl CircuitBreakerConfig {
    /// Check the invariants a breaker relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }

    /// The effective operation timeout; a zero duration counts as disabled
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}

/// Partial configuration, merged over [`CircuitBreakerConfig::default`]
///
/// Durations are expressed in milliseconds so the struct maps directly onto
/// TOML tables such as:
///
/// ```toml
/// failure_threshold = 2
/// recovery_timeout_ms = 60000
/// timeout_ms = 15000
/// ```
///
/// A `timeout_ms` of 0 disables the per-operation timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerOverrides {
    pub failure_threshold: Option<u32>,
    pub recovery_timeout_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl CircuitBreakerOverrides {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    pub fn recovery_timeout_ms(mut self, ms: u64) -> Self {
        self.recovery_timeout_ms = Some(ms);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Layer these overrides on top of `base`; fields set here win
    pub fn merged_over(self, base: CircuitBreakerOverrides) -> CircuitBreakerOverrides {
        CircuitBreakerOverrides {
            failure_threshold: self.failure_threshold.or(base.failure_threshold),
            recovery_timeout_ms: self.recovery_timeout_ms.or(base.recovery_timeout_ms),
            timeout_ms: self.timeout_ms.or(base.timeout_ms),
        }
    }

    /// Overlay the set fields onto `base`
    pub fn apply_to(&self, base: CircuitBreakerConfig) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            recovery_timeout: self
                .recovery_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.recovery_timeout),
            timeout: match self.timeout_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => base.timeout,
            },
        }
    }

    /// Merge over the defaults and validate the result
    pub fn into_config(self) -> Result<CircuitBreakerConfig, ConfigError> {
        let config = self.apply_to(CircuitBreakerConfig::default());
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = CircuitBreakerOverrides::default()
            .failure_threshold(2)
            .into_config()
            .unwrap();

        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = CircuitBreakerOverrides::default()
            .timeout_ms(0)
            .into_config()
            .unwrap();
        assert_eq!(config.timeout, None);
        assert_eq!(config.effective_timeout(), None);
    }

    #[test]
    fn test_zero_duration_timeout_is_not_effective() {
        let config = CircuitBreakerConfig {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(config.effective_timeout(), None);
    }

    #[test]
    fn test_merged_over_prefers_top_layer() {
        let base = CircuitBreakerOverrides::default()
            .failure_threshold(2)
            .timeout_ms(15_000);
        let top = CircuitBreakerOverrides::default().failure_threshold(4);

        let merged = top.merged_over(base);
        assert_eq!(merged.failure_threshold, Some(4));
        assert_eq!(merged.recovery_timeout_ms, None);
        assert_eq!(merged.timeout_ms, Some(15_000));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = CircuitBreakerOverrides::default()
            .failure_threshold(0)
            .into_config();
        assert_eq!(result, Err(ConfigError::ZeroFailureThreshold));
    }
}
