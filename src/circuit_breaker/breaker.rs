use super::types::{BreakerStatus, CircuitBreakerConfig, CircuitState};
use crate::error::{BreakerError, Result};
use crate::store::{failure_count_key, CounterStore, StoreError};
use crate::taxonomy::{ErrorKind, ErrorTaxonomy};
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker guarding a single downstream dependency
///
/// The failure count lives in the [`CounterStore`] under
/// `"{name}.failureCount"`; the trip moment lives in memory. Every
/// read-modify-write of the count happens under one lock, together with any
/// change to the trip moment.
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Trip moment, also serving as the counter lock
    state: Mutex<State>,
    /// Durable failure counters
    store: Arc<dyn CounterStore>,
    /// Error kinds used to classify failures
    taxonomy: Arc<ErrorTaxonomy>,
    /// Kind counted by `record_error`
    trip_on: Option<ErrorKind>,
    /// Failure counter key
    key: String,
}

#[derive(Debug, Default)]
struct State {
    /// When the failure count last crossed the threshold
    tripped_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// Fails with `InvalidMatchSpec` if `trip_on` names an unknown error kind.
    pub fn new(
        config: CircuitBreakerConfig,
        store: Arc<dyn CounterStore>,
        taxonomy: Arc<ErrorTaxonomy>,
    ) -> Result<Self> {
        config.validate()?;

        let trip_on = config
            .trip_on
            .as_deref()
            .map(|spec| taxonomy.resolve(spec))
            .transpose()?;

        info!(
            breaker = %config.name,
            trip_threshold = config.trip_threshold,
            trip_reset_time_ms = config.trip_reset_time_ms,
            trip_on = ?config.trip_on,
            "Creating circuit breaker"
        );

        Ok(Self {
            key: failure_count_key(&config.name),
            config,
            state: Mutex::new(State::default()),
            store,
            taxonomy,
            trip_on,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Pass `payload` through, or reject it while the circuit is open
    ///
    /// An open circuit whose reset time has elapsed closes here: the trip
    /// moment is cleared, the counter goes back to zero and the payload
    /// passes.
    pub async fn evaluate<T>(&self, payload: T) -> Result<T> {
        let mut state = self.state.lock().await;
        let failures = self.read_failure_count().await;

        if failures < u64::from(self.config.trip_threshold) {
            debug!(
                breaker = %self.config.name,
                failures,
                threshold = self.config.trip_threshold,
                "Failure count below trip threshold"
            );
            return Ok(payload);
        }

        if let Some(tripped_at) = state.tripped_at {
            if tripped_at.elapsed() > self.config.trip_reset_time() {
                info!(
                    breaker = %self.config.name,
                    reset_time = ?self.config.trip_reset_time(),
                    "Trip reset time exceeded, closing circuit"
                );
                // Trip moment stays until the counter is cleared
                if self.write_failure_count(0).await {
                    state.tripped_at = None;
                }
                return Ok(payload);
            }
        }

        debug!(
            breaker = %self.config.name,
            failures,
            "Circuit breaker open, rejecting payload"
        );
        Err(BreakerError::OpenCircuit(self.config.name.clone()))
    }

    /// Record `error` if its root cause is of kind `match_spec` or a subtype
    pub async fn record_failure(
        &self,
        error: &(dyn Error + Send + Sync + 'static),
        match_spec: &str,
    ) -> Result<()> {
        let target = self.taxonomy.resolve(match_spec)?;
        self.record_if_matching(error, Some(&target)).await;
        Ok(())
    }

    /// Record `error` against the configured `trip_on` kind
    pub async fn record_error(&self, error: &(dyn Error + Send + Sync + 'static)) {
        self.record_if_matching(error, self.trip_on.as_ref()).await;
    }

    /// Current state without triggering a transition
    pub async fn status(&self) -> BreakerStatus {
        let state = self.state.lock().await;
        let failure_count = self.read_failure_count().await;
        let tripped_for = state.tripped_at.map(|t| t.elapsed());

        let cooled_down = tripped_for.map_or(false, |e| e > self.config.trip_reset_time());
        let open = failure_count >= u64::from(self.config.trip_threshold) && !cooled_down;

        BreakerStatus {
            name: self.config.name.clone(),
            state: if open {
                CircuitState::Open
            } else {
                CircuitState::Closed
            },
            failure_count,
            trip_threshold: self.config.trip_threshold,
            tripped_for_ms: tripped_for
                .map(|e| u64::try_from(e.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Close the circuit and drop the failure counter
    ///
    /// Nothing changes if the counter cannot be removed.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;

        if let Err(e) = self.call_store(self.store.remove(&self.key)).await {
            error!(
                breaker = %self.config.name,
                key = %self.key,
                error = %e,
                "Could not remove failure count, circuit breaker not reset"
            );
            return;
        }

        state.tripped_at = None;
        info!(breaker = %self.config.name, "Circuit breaker reset");
    }

    async fn record_if_matching(
        &self,
        error: &(dyn Error + Send + Sync + 'static),
        target: Option<&ErrorKind>,
    ) {
        let matched = match target {
            Some(kind) => self.taxonomy.matches(error, kind),
            None => true,
        };

        if !matched {
            debug!(
                breaker = %self.config.name,
                error = %error,
                trip_on = ?target.map(ErrorKind::name),
                "Failure does not match trip kind, ignoring"
            );
            return;
        }

        let mut state = self.state.lock().await;
        let Some(failures) = self.increment_failure_count().await else {
            return;
        };

        debug!(
            breaker = %self.config.name,
            failures,
            threshold = self.config.trip_threshold,
            error = %error,
            "Recorded matching failure"
        );

        if failures >= u64::from(self.config.trip_threshold) && state.tripped_at.is_none() {
            warn!(
                breaker = %self.config.name,
                failures,
                threshold = self.config.trip_threshold,
                "Trip threshold reached, opening circuit"
            );
            state.tripped_at = Some(Instant::now());
        }
    }

    /// Run a store call under the configured timeout
    async fn call_store<T, F>(&self, operation: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let limit = self.config.store_timeout();
        match timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(limit)),
        }
    }

    async fn read_failure_count(&self) -> u64 {
        match self.call_store(self.store.get(&self.key)).await {
            Ok(count) => count.unwrap_or(0),
            Err(e) => {
                error!(
                    breaker = %self.config.name,
                    key = %self.key,
                    error = %e,
                    "Could not read failure count, treating it as 0"
                );
                0
            }
        }
    }

    /// Returns the new count, or `None` if the store could not be updated
    async fn increment_failure_count(&self) -> Option<u64> {
        let current = match self.call_store(self.store.get(&self.key)).await {
            Ok(count) => count.unwrap_or(0),
            Err(e) => {
                error!(
                    breaker = %self.config.name,
                    key = %self.key,
                    error = %e,
                    "Could not read failure count, failure not recorded"
                );
                return None;
            }
        };

        let failures = current.saturating_add(1);
        match self.call_store(self.store.set(&self.key, failures)).await {
            Ok(()) => Some(failures),
            Err(e) => {
                error!(
                    breaker = %self.config.name,
                    key = %self.key,
                    error = %e,
                    "Could not store failure count, failure not recorded"
                );
                None
            }
        }
    }

    /// Returns whether the count was stored
    async fn write_failure_count(&self, value: u64) -> bool {
        match self.call_store(self.store.set(&self.key, value)).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    breaker = %self.config.name,
                    key = %self.key,
                    error = %e,
                    "Could not store failure count"
                );
                false
            }
        }
    }
}
