//! Failure counter stores
//!
//! A breaker keeps its failure count outside of its own memory so that the
//! count survives restarts and can be shared by every replica configured with
//! the same breaker name.
//!
//! - [`MemoryCounterStore`]: process-local, backed by a `DashMap`
//! - [`RedisCounterStore`]: shared, backed by a Redis connection manager
//!
//! Breakers never propagate a [`StoreError`]; they log it and carry on as if
//! the counter were zero.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Counter store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store holding failure counters
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter; `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Write a counter, replacing any previous value
    async fn set(&self, key: &str, value: u64) -> Result<(), StoreError>;

    /// Delete a counter
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Store key for a breaker's failure counter
pub fn failure_count_key(breaker: &str) -> String {
    format!("{}.failureCount", breaker)
}

/// Counter store backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store; counters are lost on restart
    #[default]
    Memory,
    /// Redis store shared by every replica
    Redis {
        /// Redis connection URL
        url: String,
    },
}

/// Build the configured counter store
///
/// A Redis store that does not answer `PING` is replaced by an in-memory one.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn CounterStore>, StoreError> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory failure counter store");
            Ok(Arc::new(MemoryCounterStore::new()))
        }
        StoreConfig::Redis { url } => {
            let store = RedisCounterStore::new(url).await?;
            match store.ping().await {
                Ok(()) => {
                    info!("Redis connection successful, using Redis failure counter store");
                    Ok(Arc::new(store))
                }
                Err(e) => {
                    warn!(
                        "Redis ping failed: {}, falling back to in-memory failure counter store",
                        e
                    );
                    Ok(Arc::new(MemoryCounterStore::new()))
                }
            }
        }
    }
}
