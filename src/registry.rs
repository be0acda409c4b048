/*!
 * Named circuit breaker registry
 *
 * The registry owns one breaker per name and answers aggregate questions
 * (which circuits are open, how healthy is the process overall) for health
 * and metrics endpoints.
 */

use crate::error::{BreakwaterError, Result};
use breakwater_core_resilience::{
    CircuitBreaker, CircuitBreakerMetrics, CircuitBreakerOverrides, CircuitState, EventSink,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Overall health derived from every registered breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Critical,
}

impl fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallHealth::Healthy => write!(f, "healthy"),
            OverallHealth::Degraded => write!(f, "degraded"),
            OverallHealth::Critical => write!(f, "critical"),
        }
    }
}

/// Counts of breakers per state plus the overall verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total_services: usize,
    /// Breakers in CLOSED
    pub healthy_services: usize,
    /// Breakers in HALF_OPEN
    pub degraded_services: usize,
    /// Breakers in OPEN
    pub failed_services: usize,
    pub overall_health: OverallHealth,
}

impl HealthSummary {
    fn from_states(states: impl IntoIterator<Item = CircuitState>) -> Self {
        let (mut total, mut healthy, mut degraded, mut failed) = (0, 0, 0, 0);
        for state in states {
            total += 1;
            match state {
                CircuitState::Closed => healthy += 1,
                CircuitState::HalfOpen => degraded += 1,
                CircuitState::Open => failed += 1,
            }
        }

        let overall_health = if failed > 0 {
            if failed > healthy {
                OverallHealth::Critical
            } else {
                OverallHealth::Degraded
            }
        } else if degraded > 0 {
            OverallHealth::Degraded
        } else {
            OverallHealth::Healthy
        };

        Self {
            total_services: total,
            healthy_services: healthy,
            degraded_services: degraded,
            failed_services: failed,
            overall_health,
        }
    }
}

/// Registry of breakers keyed by name
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: RwLock<BTreeMap<String, CircuitBreaker>>,
    /// Sink handed to breakers the registry creates
    events: Option<Arc<dyn EventSink>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose newly created breakers report to `events`
    pub fn with_event_sink(events: Arc<dyn EventSink>) -> Self {
        Self {
            breakers: RwLock::default(),
            events: Some(events),
        }
    }

    /// Get the breaker named `name`, creating it from `overrides` if absent
    ///
    /// The first creation wins: overrides passed for an existing name are
    /// ignored.
    pub fn get_or_create(
        &self,
        name: &str,
        overrides: Option<CircuitBreakerOverrides>,
    ) -> Result<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let mut breakers = self.write();
        // Another caller may have raced us between the read and write locks
        if let Some(existing) = breakers.get(name) {
            return Ok(existing.clone());
        }

        let breaker = CircuitBreaker::from_overrides(name, overrides.unwrap_or_default())
            .map_err(|source| BreakwaterError::Breaker {
                name: name.to_string(),
                source,
            })?;
        let breaker = match &self.events {
            Some(events) => breaker.with_event_sink(events.clone()),
            None => breaker,
        };
        breakers.insert(name.to_string(), breaker.clone());

        info!(
            breaker = name,
            total_circuits = breakers.len(),
            "Circuit breaker created"
        );
        Ok(breaker)
    }

    /// Register an already-built breaker under its own name
    ///
    /// Returns the breaker actually registered, which is the existing one if
    /// the name was taken.
    pub fn register(&self, breaker: CircuitBreaker) -> CircuitBreaker {
        let mut breakers = self.write();
        breakers
            .entry(breaker.name().to_string())
            .or_insert(breaker)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.read().get(name).cloned()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Metrics snapshot for every breaker
    pub fn all_metrics(&self) -> BTreeMap<String, CircuitBreakerMetrics> {
        self.read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.metrics()))
            .collect()
    }

    /// Reset every registered breaker
    pub fn reset_all(&self) {
        let breakers = self.read();
        for breaker in breakers.values() {
            breaker.reset();
        }
        info!(total_circuits = breakers.len(), "All circuit breakers reset");
    }

    /// Names of breakers currently OPEN
    pub fn open_circuits(&self) -> Vec<String> {
        self.read()
            .iter()
            .filter(|(_, breaker)| breaker.state() == CircuitState::Open)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Aggregate health across all breakers
    pub fn health_summary(&self) -> HealthSummary {
        HealthSummary::from_states(self.read().values().map(CircuitBreaker::state))
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, CircuitBreaker>> {
        self.breakers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, CircuitBreaker>> {
        self.breakers.write().unwrap_or_else(PoisonError::into_inner)
    }
}
