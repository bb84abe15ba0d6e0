//! Catalog maintenance: seeding and reading stock levels.

use state_store::{PutOptions, Result, StateStore, StateStoreError, StateStoreExt, Version};

use crate::model::{InventoryRecord, RESERVATION_KEY_PREFIX};

/// Reads and restocks inventory records outside of a reservation.
pub struct InventoryCatalog<S: StateStore> {
    store: S,
}

impl<S: StateStore> InventoryCatalog<S> {
    /// Creates a new catalog over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the record stored for `item`, if any.
    pub async fn get(&self, item: &str) -> Result<Option<InventoryRecord>> {
        Ok(self
            .store
            .get_as::<InventoryRecord>(item)
            .await?
            .map(|(record, _)| record))
    }

    /// Overwrites the stock level of `record.name`.
    ///
    /// Last write wins: a restock running alongside reservations of the same
    /// item replaces whatever they debited in between.
    #[tracing::instrument(
        skip(self, record),
        fields(item = %record.name, quantity = record.quantity)
    )]
    pub async fn restock(&self, record: &InventoryRecord) -> Result<Version> {
        if record.name.trim().is_empty() {
            return Err(StateStoreError::InvalidOperation(
                "item name must not be empty".to_string(),
            ));
        }
        if record.name.starts_with(RESERVATION_KEY_PREFIX) {
            return Err(StateStoreError::InvalidOperation(format!(
                "item name must not start with '{RESERVATION_KEY_PREFIX}'"
            )));
        }

        let version = self
            .store
            .put_as(record.name.as_str(), record, PutOptions::new())
            .await?;
        tracing::info!(%version, "item restocked");
        Ok(version)
    }

    /// Restocks every record in `records`, stopping at the first failure.
    pub async fn restock_all(
        &self,
        records: impl IntoIterator<Item = InventoryRecord> + Send,
    ) -> Result<usize> {
        let mut count = 0;
        for record in records {
            self.restock(&record).await?;
            count += 1;
        }
        Ok(count)
    }
}

/// Items the workflow sample seeds before taking orders.
pub fn sample_catalog() -> Vec<InventoryRecord> {
    vec![
        InventoryRecord::new("Paperclips", 5.0, 100),
        InventoryRecord::new("Cars", 15000.0, 100),
        InventoryRecord::new("Computers", 500.0, 100),
    ]
}
