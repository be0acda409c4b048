//! Structured breaker events
//!
//! The breaker reports every decision point as a [`BreakerEvent`] handed to an
//! injected [`EventSink`]. The default sink forwards to `tracing`; hosts can
//! swap in their own sink (audit log, metrics bridge) or discard events.

use crate::circuit_breaker::CircuitState;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Something the breaker did or decided
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakerEvent {
    /// State changed as a consequence of outcomes or the recovery window
    Transition {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
        failure_count: u64,
    },

    /// State was overridden administratively
    Forced {
        breaker: String,
        from: CircuitState,
        to: CircuitState,
    },

    /// Call short-circuited without invoking the operation
    Rejected {
        breaker: String,
        state: CircuitState,
        failure_count: u64,
        fallback: bool,
    },

    /// Operation completed successfully
    Succeeded {
        breaker: String,
        state: CircuitState,
        success_count: u64,
        duration_ms: u64,
    },

    /// Operation failed (including timeouts)
    Failed {
        breaker: String,
        state: CircuitState,
        failure_count: u64,
        threshold: u32,
        duration_ms: u64,
        timed_out: bool,
    },

    /// Operation failed with an error classified as not counting
    Ignored { breaker: String, duration_ms: u64 },

    /// Fallback invoked after the operation failed
    FallbackUsed { breaker: String },

    /// Fallback failed after the operation failed; the original error wins
    FallbackFailed { breaker: String, error: String },

    /// Counters and state returned to initial values
    Reset { breaker: String },
}

/// Receiver for breaker events
pub trait EventSink: Send + Sync + std::fmt::Debug {
    fn record(&self, event: &BreakerEvent);
}

/// Forwards events to `tracing` with structured fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &BreakerEvent) {
        match event {
            BreakerEvent::Transition {
                breaker,
                from,
                to,
                failure_count,
            } => match to {
                CircuitState::Open => warn!(
                    breaker = %breaker,
                    from = %from,
                    to = %to,
                    failures = failure_count,
                    "Circuit opened"
                ),
                CircuitState::HalfOpen => info!(
                    breaker = %breaker,
                    from = %from,
                    to = %to,
                    "Circuit half-open, admitting probe"
                ),
                CircuitState::Closed => info!(
                    breaker = %breaker,
                    from = %from,
                    to = %to,
                    "Circuit closed"
                ),
            },
            BreakerEvent::Forced { breaker, from, to } => {
                warn!(breaker = %breaker, from = %from, to = %to, "Circuit state forced")
            }
            BreakerEvent::Rejected {
                breaker,
                state,
                failure_count,
                fallback,
            } => debug!(
                breaker = %breaker,
                state = %state,
                failures = failure_count,
                fallback,
                "Call short-circuited"
            ),
            BreakerEvent::Succeeded {
                breaker,
                state,
                success_count,
                duration_ms,
            } => debug!(
                breaker = %breaker,
                state = %state,
                successes = success_count,
                duration_ms,
                "Operation succeeded"
            ),
            BreakerEvent::Failed {
                breaker,
                state,
                failure_count,
                threshold,
                duration_ms,
                timed_out,
            } => warn!(
                breaker = %breaker,
                state = %state,
                failures = failure_count,
                threshold,
                duration_ms,
                timed_out,
                "Operation failed"
            ),
            BreakerEvent::Ignored {
                breaker,
                duration_ms,
            } => debug!(
                breaker = %breaker,
                duration_ms,
                "Operation failed with uncounted error"
            ),
            BreakerEvent::FallbackUsed { breaker } => {
                info!(breaker = %breaker, "Using fallback after failure")
            }
            BreakerEvent::FallbackFailed { breaker, error } => {
                error!(breaker = %breaker, error = %error, "Fallback also failed")
            }
            BreakerEvent::Reset { breaker } => info!(breaker = %breaker, "Circuit reset"),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &BreakerEvent) {}
}

/// Keeps every event in memory, in order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BreakerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<BreakerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<BreakerEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &BreakerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record(&BreakerEvent::Reset {
            breaker: "a".to_string(),
        });
        sink.record(&BreakerEvent::FallbackUsed {
            breaker: "b".to_string(),
        });

        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], BreakerEvent::Reset { breaker } if breaker == "a"));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = BreakerEvent::Transition {
            breaker: "soap".to_string(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
            failure_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "transition");
        assert_eq!(json["to"], "OPEN");
        assert_eq!(json["failure_count"], 2);
    }

    /// Log output captured from a scoped subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Record one event through `TracingSink` and return the emitted line
    fn traced(event: BreakerEvent) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || TracingSink.record(&event));

        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn level_of(line: &str) -> &str {
        line.split_whitespace().next().unwrap_or("")
    }

    fn name() -> String {
        "soap".to_string()
    }

    #[test]
    fn test_tracing_sink_levels() {
        let cases = vec![
            (
                BreakerEvent::Transition {
                    breaker: name(),
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                    failure_count: 2,
                },
                "WARN",
                "Circuit opened",
            ),
            (
                BreakerEvent::Transition {
                    breaker: name(),
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                    failure_count: 2,
                },
                "INFO",
                "half-open",
            ),
            (
                BreakerEvent::Transition {
                    breaker: name(),
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                    failure_count: 0,
                },
                "INFO",
                "Circuit closed",
            ),
            (
                BreakerEvent::Forced {
                    breaker: name(),
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                },
                "WARN",
                "Circuit state forced",
            ),
            (
                BreakerEvent::Rejected {
                    breaker: name(),
                    state: CircuitState::Open,
                    failure_count: 2,
                    fallback: true,
                },
                "DEBUG",
                "short-circuited",
            ),
            (
                BreakerEvent::Succeeded {
                    breaker: name(),
                    state: CircuitState::Closed,
                    success_count: 1,
                    duration_ms: 12,
                },
                "DEBUG",
                "Operation succeeded",
            ),
            (
                BreakerEvent::Failed {
                    breaker: name(),
                    state: CircuitState::Closed,
                    failure_count: 1,
                    threshold: 2,
                    duration_ms: 15_000,
                    timed_out: true,
                },
                "WARN",
                "Operation failed",
            ),
            (
                BreakerEvent::Ignored {
                    breaker: name(),
                    duration_ms: 3,
                },
                "DEBUG",
                "uncounted error",
            ),
            (
                BreakerEvent::FallbackUsed { breaker: name() },
                "INFO",
                "Using fallback",
            ),
            (
                BreakerEvent::FallbackFailed {
                    breaker: name(),
                    error: "boom".to_string(),
                },
                "ERROR",
                "Fallback also failed",
            ),
            (
                BreakerEvent::Reset { breaker: name() },
                "INFO",
                "Circuit reset",
            ),
        ];

        for (event, level, message) in cases {
            let line = traced(event.clone());
            assert_eq!(level_of(&line), level, "{event:?} logged as: {line}");
            assert!(line.contains(message), "{event:?} logged as: {line}");
            assert!(line.contains("breaker=soap"), "{event:?} logged as: {line}");
        }
    }

    #[test]
    fn test_failed_event_carries_structured_fields() {
        let line = traced(BreakerEvent::Failed {
            breaker: name(),
            state: CircuitState::HalfOpen,
            failure_count: 2,
            threshold: 2,
            duration_ms: 40,
            timed_out: false,
        });
        assert!(line.contains("state=HALF_OPEN"));
        assert!(line.contains("failures=2"));
        assert!(line.contains("threshold=2"));
        assert!(line.contains("timed_out=false"));
    }

    #[test]
    fn test_noop_sink_emits_nothing() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            NoopSink.record(&BreakerEvent::Reset { breaker: name() });
            NoopSink.record(&BreakerEvent::FallbackFailed {
                breaker: name(),
                error: "boom".to_string(),
            });
        });

        assert!(logs.0.lock().unwrap().is_empty());
    }
}
