//! Versioned key-value state store.
//!
//! Every stored value carries a [`Version`] that acts as its ETag. Writers
//! pass the version they read in [`PutOptions`] so that a concurrent update
//! surfaces as [`StateStoreError::VersionConflict`] instead of being lost.

pub mod entry;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use entry::{StateEntry, Version};
pub use error::{Result, StateStoreError};
pub use memory::InMemoryStateStore;
pub use postgres::PostgresStateStore;
pub use store::{PutOptions, StateOperation, StateStore, StateStoreExt};
