use super::{CounterStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory counter store
///
/// Clones share the same counters, which lets several breakers in one process
/// stand in for replicas sharing a durable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<DashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored counters
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.counters.get(key).map(|v| *v))
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        self.counters.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.counters.remove(key);
        Ok(())
    }
}
