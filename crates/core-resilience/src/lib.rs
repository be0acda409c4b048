//! Breakwater Core Resilience: a pure-logic circuit breaker
//!
//! # Overview
//!
//! This crate provides a circuit breaker that wraps calls to unreliable
//! downstream dependencies (databases, SOAP endpoints, messaging APIs). Once a
//! dependency has failed often enough the breaker short-circuits further calls,
//! then recovers on its own through a single probe call.
//!
//! - **CircuitBreaker**: per-dependency guard with timeout, fallback and metrics
//! - **Clock**: wall-clock seam used for failure/success timestamps
//! - **EventSink**: structured event seam; defaults to `tracing`
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Which dependency is behind a breaker
//! - Network protocols or client libraries
//! - How metrics are exposed
//!
//! No registry or naming discipline is imposed; that belongs to the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │ execute(op, fallback?)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (Counts failures, opens on threshold)  │
//! └─────────────┬───────────────────────────┘
//!               │ timeout race
//!               ▼
//!         External Dependency
//!      (Database, SOAP, Messaging)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use breakwater_core_resilience::{create_circuit_breaker, BreakerError, CircuitBreakerOverrides};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = create_circuit_breaker(
//!     "soap",
//!     Some(CircuitBreakerOverrides::default()
//!         .failure_threshold(2)
//!         .recovery_timeout_ms(60_000)
//!         .timeout_ms(15_000)),
//! )?;
//!
//! match breaker.execute(|| async { Ok::<_, std::io::Error>("<Envelope/>") }).await {
//!     Ok(body) => println!("{body}"),
//!     Err(BreakerError::Open { name }) => println!("{name} unavailable, degrading"),
//!     Err(e) => return Err(e.to_string().into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;

// Re-export main types for convenience
pub use circuit_breaker::{
    create_circuit_breaker, CircuitBreaker, CircuitBreakerMetrics, CircuitState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CircuitBreakerConfig, CircuitBreakerOverrides};
pub use error::{BreakerError, ConfigError};
pub use events::{BreakerEvent, EventSink, MemorySink, NoopSink, TracingSink};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use breakwater_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{create_circuit_breaker, CircuitBreaker, CircuitState};
    pub use super::config::{CircuitBreakerConfig, CircuitBreakerOverrides};
    pub use super::error::BreakerError;
    pub use super::events::{BreakerEvent, EventSink};
}
