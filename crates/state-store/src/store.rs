use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Result, StateEntry, StateStoreError, Version};

/// Options for writing or deleting a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Version the key must currently have for the write to succeed.
    /// If None, no version check is performed (last write wins).
    pub expected_version: Option<Version>,
}

impl PutOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the key to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the key to be absent.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }

    /// Checks the expectation against the version currently stored.
    pub(crate) fn check(&self, key: &str, actual: Version) -> Result<()> {
        match self.expected_version {
            Some(expected) if expected != actual => Err(StateStoreError::VersionConflict {
                key: key.to_string(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

/// A single write inside a [`StateStore::transact`] batch.
#[derive(Debug, Clone)]
pub enum StateOperation {
    /// Insert or replace the value under `key`.
    Upsert {
        key: String,
        value: serde_json::Value,
        options: PutOptions,
    },
    /// Remove `key`.
    Delete { key: String, options: PutOptions },
}

impl StateOperation {
    /// Builds an upsert from any serializable value.
    pub fn upsert<T: Serialize>(
        key: impl Into<String>,
        value: &T,
        options: PutOptions,
    ) -> Result<Self> {
        Ok(StateOperation::Upsert {
            key: key.into(),
            value: serde_json::to_value(value)?,
            options,
        })
    }

    /// Builds a delete.
    pub fn delete(key: impl Into<String>, options: PutOptions) -> Self {
        StateOperation::Delete {
            key: key.into(),
            options,
        }
    }

    /// Returns the key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            StateOperation::Upsert { key, .. } | StateOperation::Delete { key, .. } => key,
        }
    }
}

/// Core trait for state store implementations.
///
/// A state store maps string keys to JSON values, each carrying a version.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns None if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<StateEntry>>;

    /// Writes `value` under `key`.
    ///
    /// If `options.expected_version` is set, the write fails with
    /// `VersionConflict` unless the stored version matches.
    ///
    /// Returns the new version of the key.
    async fn put(&self, key: &str, value: serde_json::Value, options: PutOptions)
    -> Result<Version>;

    /// Removes `key`. Deleting an absent key without a version check succeeds.
    async fn delete(&self, key: &str, options: PutOptions) -> Result<()>;

    /// Applies a batch of operations atomically.
    ///
    /// Either every operation's version check passes and all of them are
    /// applied, or nothing is written.
    async fn transact(&self, operations: Vec<StateOperation>) -> Result<()>;
}

/// Extension trait providing typed convenience methods for state stores.
#[async_trait]
pub trait StateStoreExt: StateStore {
    /// Reads and deserializes the value under `key`, with its version.
    async fn get_as<T>(&self, key: &str) -> Result<Option<(T, Version)>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(entry) => Ok(Some((entry.decode()?, entry.version))),
            None => Ok(None),
        }
    }

    /// Serializes and writes `value` under `key`.
    async fn put_as<T>(&self, key: &str, value: &T, options: PutOptions) -> Result<Version>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.put(key, value, options).await
    }

    /// Checks if a key holds a value.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

// Blanket implementation for all StateStore implementations
impl<T: StateStore + ?Sized> StateStoreExt for T {}

/// Validates a transaction batch before applying it.
pub fn validate_operations(operations: &[StateOperation]) -> Result<()> {
    if operations.is_empty() {
        return Err(StateStoreError::InvalidOperation(
            "Cannot apply an empty transaction".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(operations.len());
    for op in operations {
        let key = op.key();
        if key.is_empty() {
            return Err(StateStoreError::InvalidOperation(
                "Keys must not be empty".to_string(),
            ));
        }
        if !seen.insert(key) {
            return Err(StateStoreError::InvalidOperation(format!(
                "Key '{key}' appears more than once in the transaction"
            )));
        }
    }

    Ok(())
}
