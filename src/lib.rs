/*!
 * Breakwater - circuit breakers for a service's external dependencies
 *
 * Host-side wiring around `breakwater-core-resilience`:
 * - TOML configuration of per-dependency breaker settings
 * - Structured logging initialisation
 * - A named breaker registry with aggregate health
 * - Canonical breakers for the database, SOAP and messaging dependencies
 *
 * Everything is built explicitly at startup and shared by handle; nothing is
 * created at module load.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod services;

// Re-export commonly used types
pub use breakwater_core_resilience as resilience;
pub use breakwater_core_resilience::{
    BreakerError, CircuitBreaker, CircuitBreakerMetrics, CircuitBreakerOverrides, CircuitState,
};
pub use config::{BreakwaterConfig, LogLevel, LoggingConfig};
pub use error::{BreakwaterError, Result};
pub use registry::{BreakerRegistry, HealthSummary, OverallHealth};
pub use services::{Dependency, DependencyBreakers};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a host process needs, built once at startup
#[derive(Debug)]
pub struct Breakwater {
    pub registry: Arc<BreakerRegistry>,
    pub dependencies: DependencyBreakers,
}

impl Breakwater {
    /// Build the registry and the canonical dependency breakers
    ///
    /// Every `[breakers.<name>]` section is registered, not only the
    /// canonical ones.
    pub fn from_config(config: &BreakwaterConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(BreakerRegistry::new());
        let dependencies = DependencyBreakers::from_config(config, &registry)?;
        for name in config.breakers.keys() {
            registry.get_or_create(name, Some(config.overrides_for(name)))?;
        }

        info!(
            version = VERSION,
            breakers = registry.len(),
            "Breakwater initialised"
        );
        Ok(Self {
            registry,
            dependencies,
        })
    }

    /// Load configuration, initialise logging, then build the breakers
    pub fn start(config_path: &Path) -> Result<Self> {
        let config = BreakwaterConfig::from_file(config_path)?;
        logging::init_logging(&config.logging)?;
        Self::from_config(&config)
    }

    /// Aggregate health across every registered breaker
    pub fn health(&self) -> HealthSummary {
        self.registry.health_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_from_config_registers_extra_breakers() {
        let config = BreakwaterConfig::from_toml_str(
            r#"
            [breakers.openrouter]
            failure_threshold = 4
        "#,
        )
        .unwrap();
        let app = Breakwater::from_config(&config).unwrap();

        assert_eq!(
            app.registry.names(),
            vec!["database", "messaging", "openrouter", "soap"]
        );
        assert_eq!(
            app.registry.get("openrouter").unwrap().config().failure_threshold,
            4
        );
        assert_eq!(app.health().overall_health, OverallHealth::Healthy);
    }
}
