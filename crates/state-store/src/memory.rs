use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Result, StateEntry, StateStoreError, Version,
    store::{PutOptions, StateOperation, StateStore, validate_operations},
};

/// In-memory state store implementation for testing and local runs.
///
/// Besides the regular store contract it can simulate a remote store: a
/// per-operation latency (which opens the window between a read and the
/// following write) and an outage switch.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    entries: Arc<RwLock<HashMap<String, StateEntry>>>,
    latency: Option<Duration>,
    unavailable: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl InMemoryStateStore {
    /// Creates a new empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every operation by `latency` before it touches the data.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every subsequent operation fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of committed writes (puts, deletes, transactions).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the number of keys stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes all keys.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn simulate_remote_call(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StateStoreError::Unavailable(
                "in-memory store is switched off".to_string(),
            ));
        }
        Ok(())
    }

    fn current_version(entries: &HashMap<String, StateEntry>, key: &str) -> Version {
        entries
            .get(key)
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateEntry>> {
        self.simulate_remote_call().await?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        options: PutOptions,
    ) -> Result<Version> {
        self.simulate_remote_call().await?;

        let mut entries = self.entries.write().await;
        let current = Self::current_version(&entries, key);
        options.check(key, current)?;

        let version = current.next();
        entries.insert(
            key.to_string(),
            StateEntry {
                key: key.to_string(),
                value,
                version,
                updated_at: Utc::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(version)
    }

    async fn delete(&self, key: &str, options: PutOptions) -> Result<()> {
        self.simulate_remote_call().await?;

        let mut entries = self.entries.write().await;
        let current = Self::current_version(&entries, key);
        options.check(key, current)?;

        if entries.remove(key).is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn transact(&self, operations: Vec<StateOperation>) -> Result<()> {
        validate_operations(&operations)?;
        self.simulate_remote_call().await?;

        let mut entries = self.entries.write().await;

        // Check every expectation before mutating anything
        for op in &operations {
            let (key, options) = match op {
                StateOperation::Upsert { key, options, .. }
                | StateOperation::Delete { key, options } => (key, options),
            };
            options.check(key, Self::current_version(&entries, key))?;
        }

        let now = Utc::now();
        for op in operations {
            match op {
                StateOperation::Upsert { key, value, .. } => {
                    let version = Self::current_version(&entries, &key).next();
                    entries.insert(
                        key.clone(),
                        StateEntry {
                            key,
                            value,
                            version,
                            updated_at: now,
                        },
                    );
                }
                StateOperation::Delete { key, .. } => {
                    entries.remove(&key);
                }
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}
