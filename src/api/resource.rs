use crate::config::ResourceConfig;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Failures of the simulated downstream resource
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Connecting to resource failed. Resource not available. Try again later.")]
    ConnectionNotAvailable(#[source] io::Error),
}

/// Stand-in for a slow, unreliable downstream dependency
#[derive(Debug, Clone)]
pub struct SimulatedResource {
    latency: Duration,
    available: bool,
}

impl SimulatedResource {
    pub fn new(config: &ResourceConfig) -> Self {
        Self {
            latency: config.latency(),
            available: config.available,
        }
    }

    /// Connect and hand `payload` to the resource
    pub async fn connect(&self, payload: &str) -> Result<String, ResourceError> {
        info!(latency = ?self.latency, "Connecting to external resource");
        tokio::time::sleep(self.latency).await;

        if self.available {
            Ok(format!("Delivered {}", payload))
        } else {
            Err(ResourceError::ConnectionNotAvailable(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "resource refused the connection",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ErrorTaxonomy;

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_resource_fails_after_latency() {
        let resource = SimulatedResource::new(&ResourceConfig::default());
        let start = tokio::time::Instant::now();

        let err = resource.connect("order-1").await.unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(3000));

        let taxonomy = ErrorTaxonomy::standard();
        let kind = taxonomy.classify(&err).unwrap();
        assert_eq!(kind.name(), "network.connection_refused");
    }

    #[tokio::test]
    async fn test_available_resource_delivers_payload() {
        let resource = SimulatedResource::new(&ResourceConfig {
            latency_ms: 0,
            available: true,
        });
        assert_eq!(
            resource.connect("order-1").await.unwrap(),
            "Delivered order-1"
        );
    }
}
