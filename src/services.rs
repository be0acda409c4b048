/*!
 * Canonical per-dependency breakers
 *
 * The host talks to three external dependencies. Each gets one breaker,
 * built once at startup and shared by handle with whatever performs those
 * calls.
 */

use crate::config::BreakwaterConfig;
use crate::error::{BreakwaterError, Result};
use crate::registry::BreakerRegistry;
use breakwater_core_resilience::{CircuitBreaker, CircuitBreakerOverrides};
use std::fmt;

/// External dependencies with a dedicated breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Persistence layer
    Database,
    /// SOAP integration endpoint
    Soap,
    /// Messaging API
    Messaging,
}

impl Dependency {
    pub const ALL: [Dependency; 3] = [Dependency::Database, Dependency::Soap, Dependency::Messaging];

    /// Breaker name, also the `[breakers.<name>]` config key
    pub fn name(&self) -> &'static str {
        match self {
            Dependency::Database => "database",
            Dependency::Soap => "soap",
            Dependency::Messaging => "messaging",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    /// Built-in settings, used for any field the config file leaves out
    pub fn default_overrides(&self) -> CircuitBreakerOverrides {
        let base = CircuitBreakerOverrides::default();
        match self {
            Dependency::Database => base
                .failure_threshold(3)
                .recovery_timeout_ms(30_000)
                .timeout_ms(10_000),
            // SOAP calls are slow and the endpoint recovers slowly
            Dependency::Soap => base
                .failure_threshold(2)
                .recovery_timeout_ms(60_000)
                .timeout_ms(15_000),
            Dependency::Messaging => base
                .failure_threshold(5)
                .recovery_timeout_ms(30_000)
                .timeout_ms(20_000),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One breaker per canonical dependency
#[derive(Debug, Clone)]
pub struct DependencyBreakers {
    pub database: CircuitBreaker,
    pub soap: CircuitBreaker,
    pub messaging: CircuitBreaker,
}

impl DependencyBreakers {
    /// Build all canonical breakers from configuration and register them
    pub fn from_config(config: &BreakwaterConfig, registry: &BreakerRegistry) -> Result<Self> {
        let build = |dependency: Dependency| -> Result<CircuitBreaker> {
            let name = dependency.name();
            registry.get_or_create(name, Some(config.overrides_for(name)))
        };

        Ok(Self {
            database: build(Dependency::Database)?,
            soap: build(Dependency::Soap)?,
            messaging: build(Dependency::Messaging)?,
        })
    }

    pub fn get(&self, dependency: Dependency) -> &CircuitBreaker {
        match dependency {
            Dependency::Database => &self.database,
            Dependency::Soap => &self.soap,
            Dependency::Messaging => &self.messaging,
        }
    }

    /// Canonical dependencies whose breaker is open
    pub fn unhealthy(&self) -> Vec<Dependency> {
        Dependency::ALL
            .into_iter()
            .filter(|d| !self.get(*d).is_healthy())
            .collect()
    }
}

/// Look up a breaker for a dependency, failing if it was never registered
pub fn breaker_for(registry: &BreakerRegistry, dependency: Dependency) -> Result<CircuitBreaker> {
    registry
        .get(dependency.name())
        .ok_or_else(|| BreakwaterError::NotRegistered(dependency.name().to_string()))
}
