use crate::error::{BreakerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, payloads flow normally
    Closed,
    /// Circuit is open, payloads are rejected
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Breaker name; namespaces the failure counter key
    pub name: String,

    /// Number of matching failures before opening the circuit
    #[serde(default = "default_trip_threshold")]
    pub trip_threshold: u32,

    /// Cooldown in milliseconds after which an open circuit closes again
    #[serde(default = "default_trip_reset_time_ms")]
    pub trip_reset_time_ms: u64,

    /// Upper bound in milliseconds on each counter store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Error kind counted by `record_error`; every error counts when unset
    #[serde(default)]
    pub trip_on: Option<String>,
}

fn default_trip_threshold() -> u32 {
    3
}

fn default_trip_reset_time_ms() -> u64 {
    60000
}

fn default_store_timeout_ms() -> u64 {
    1000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            trip_threshold: default_trip_threshold(),
            trip_reset_time_ms: default_trip_reset_time_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            trip_on: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Configuration with defaults for everything but the name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn trip_reset_time(&self) -> Duration {
        Duration::from_millis(self.trip_reset_time_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BreakerError::Config(
                "Circuit breaker name cannot be empty".to_string(),
            ));
        }

        if self.trip_threshold == 0 {
            return Err(BreakerError::Config(format!(
                "Trip threshold must be >= 1 for circuit breaker: {}",
                self.name
            )));
        }

        if self.store_timeout_ms == 0 {
            return Err(BreakerError::Config(format!(
                "Store timeout must be > 0 for circuit breaker: {}",
                self.name
            )));
        }

        Ok(())
    }
}

/// Point-in-time view of a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// Breaker name
    pub name: String,
    /// Current state as the gate would see it
    pub state: CircuitState,
    /// Failures recorded since the last reset
    pub failure_count: u64,
    /// Configured trip threshold
    pub trip_threshold: u32,
    /// Milliseconds since the breaker tripped, if it has
    pub tripped_for_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "Closed");
        assert_eq!(CircuitState::Open.to_string(), "Open");
    }

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::named("payments");
        assert_eq!(config.name, "payments");
        assert_eq!(config.trip_threshold, 3);
        assert_eq!(config.trip_reset_time_ms, 60000);
        assert_eq!(config.store_timeout_ms, 1000);
        assert_eq!(config.trip_on, None);
        assert_eq!(config.trip_reset_time(), Duration::from_secs(60));
    }

    #[test]
    fn test_config_from_yaml_defaults() {
        let config: CircuitBreakerConfig = serde_yaml::from_str("name: inventory").unwrap();
        assert_eq!(config, CircuitBreakerConfig::named("inventory"));
    }

    #[test]
    fn test_validate() {
        assert!(CircuitBreakerConfig::named("payments").validate().is_ok());
        assert!(CircuitBreakerConfig::default().validate().is_err());

        let config = CircuitBreakerConfig {
            trip_threshold: 0,
            ..CircuitBreakerConfig::named("payments")
        };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig {
            store_timeout_ms: 0,
            ..CircuitBreakerConfig::named("payments")
        };
        assert!(config.validate().is_err());
    }
}
