/*!
 * Error types for Breakwater
 */

use breakwater_core_resilience::ConfigError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BreakwaterError>;

#[derive(Debug, Error)]
pub enum BreakwaterError {
    /// Configuration file could not be read
    #[error("Failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid TOML for our schema
    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A breaker section holds invalid settings
    #[error("Invalid settings for breaker '{name}': {source}")]
    Breaker {
        name: String,
        #[source]
        source: ConfigError,
    },

    /// No breaker registered under this name
    #[error("Circuit breaker '{0}' is not registered")]
    NotRegistered(String),

    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),
}

impl BreakwaterError {
    /// True for errors caused by bad configuration rather than the environment
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BreakwaterError::ConfigParse(_) | BreakwaterError::Breaker { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_error_display() {
        let err = BreakwaterError::Breaker {
            name: "soap".to_string(),
            source: ConfigError::ZeroFailureThreshold,
        };
        assert_eq!(
            err.to_string(),
            "Invalid settings for breaker 'soap': failure_threshold must be at least 1"
        );
        assert!(err.is_config());
    }

    #[test]
    fn test_unreadable_config_is_not_a_config_error() {
        let err = BreakwaterError::ConfigRead {
            path: PathBuf::from("/etc/breakwater.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(!err.is_config());
        assert_eq!(
            err.to_string(),
            "Failed to read config /etc/breakwater.toml: missing"
        );
    }
}
