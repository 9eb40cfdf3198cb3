use super::breaker::CircuitBreaker;
use super::types::{BreakerStatus, CircuitBreakerConfig};
use crate::error::{BreakerError, Result};
use crate::store::CounterStore;
use crate::taxonomy::ErrorTaxonomy;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::error::Error;
use std::sync::Arc;
use tracing::debug;

/// Named circuit breakers sharing one counter store and one taxonomy
///
/// Built once at startup and handed to whatever needs a breaker.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    /// Circuit breakers by name
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    /// Shared failure counter store
    store: Arc<dyn CounterStore>,
    /// Shared error kinds
    taxonomy: Arc<ErrorTaxonomy>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry
    pub fn new(store: Arc<dyn CounterStore>, taxonomy: Arc<ErrorTaxonomy>) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            store,
            taxonomy,
        }
    }

    /// Create a registry holding one breaker per configuration
    pub fn from_configs(
        configs: &[CircuitBreakerConfig],
        store: Arc<dyn CounterStore>,
        taxonomy: Arc<ErrorTaxonomy>,
    ) -> Result<Self> {
        let registry = Self::new(store, taxonomy);
        for config in configs {
            registry.register(config.clone())?;
        }
        Ok(registry)
    }

    /// Add a breaker; names must be unique
    pub fn register(&self, config: CircuitBreakerConfig) -> Result<Arc<CircuitBreaker>> {
        match self.breakers.entry(config.name.clone()) {
            Entry::Occupied(_) => Err(BreakerError::Config(format!(
                "Duplicate circuit breaker name: {}",
                config.name
            ))),
            Entry::Vacant(entry) => {
                let breaker = Arc::new(CircuitBreaker::new(
                    config,
                    self.store.clone(),
                    self.taxonomy.clone(),
                )?);
                debug!(breaker = breaker.name(), "Registered circuit breaker");
                entry.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// Look up a breaker
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.value().clone())
    }

    /// Look up a breaker, failing with `NotFound`
    pub fn breaker(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        self.get(name)
            .ok_or_else(|| BreakerError::NotFound(name.to_string()))
    }

    /// Gate `payload` through the named breaker
    pub async fn evaluate<T>(&self, name: &str, payload: T) -> Result<T> {
        self.breaker(name)?.evaluate(payload).await
    }

    /// Record a failure against the named breaker
    pub async fn record_failure(
        &self,
        name: &str,
        error: &(dyn Error + Send + Sync + 'static),
        match_spec: &str,
    ) -> Result<()> {
        self.breaker(name)?.record_failure(error, match_spec).await
    }

    /// Record a failure against the named breaker's `trip_on` kind
    pub async fn record_error(
        &self,
        name: &str,
        error: &(dyn Error + Send + Sync + 'static),
    ) -> Result<()> {
        self.breaker(name)?.record_error(error).await;
        Ok(())
    }

    /// Names of all registered breakers
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Status of every breaker, sorted by name
    pub async fn all_status(&self) -> Vec<BreakerStatus> {
        let breakers: Vec<_> = self.breakers.iter().map(|e| e.value().clone()).collect();

        let mut results = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            results.push(breaker.status().await);
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }
}
