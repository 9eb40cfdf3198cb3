use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{BreakerError, Result};
use crate::store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Failure counter store
    #[serde(default)]
    pub store: StoreConfig,
    /// Circuit breaker definitions
    #[serde(default)]
    pub breakers: Vec<CircuitBreakerConfig>,
    /// Simulated downstream resource behind `/resource/:name`
    #[serde(default)]
    pub resource: ResourceConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Simulated downstream resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// How long a connection attempt takes before failing, in milliseconds
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Whether connection attempts succeed
    #[serde(default)]
    pub available: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_latency_ms() -> u64 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            available: false,
        }
    }
}

impl ResourceConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl Settings {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BreakerError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BreakerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for breaker in &self.breakers {
            breaker.validate()?;

            if !names.insert(breaker.name.as_str()) {
                return Err(BreakerError::Config(format!(
                    "Duplicate circuit breaker name: {}",
                    breaker.name
                )));
            }
        }

        if let StoreConfig::Redis { url } = &self.store {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(BreakerError::Config(format!(
                    "Redis URL must start with redis:// or rediss://: {}",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            breakers: vec![],
            resource: ResourceConfig::default(),
        }
    }
}
