//! Inventory reservation activity for payment workflows.
//!
//! A workflow hands the activity a [`PaymentRequest`]; the activity checks
//! that the state store holds enough stock of the purchased item and debits
//! it, or fails so the workflow can compensate:
//! 1. Read the item's [`InventoryRecord`] and its version
//! 2. Reject the request if the stock would go negative
//! 3. Write the debited record, conditioned on the version read
//!
//! Conflicting writes restart the cycle; a per-request marker committed with
//! the debit keeps redelivered requests from debiting twice.

pub mod activity;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod reservation;

pub use activity::{Activity, ActivityContext, ActivityRegistry};
pub use catalog::{InventoryCatalog, sample_catalog};
pub use config::{ReservationConfig, WriteMode};
pub use error::{ActivityError, FailureKind, ReservationError};
pub use model::{InventoryRecord, OrderPayload, PaymentRequest, ReservationMarker, marker_key};
pub use reservation::{RESERVE_INVENTORY_ACTIVITY, ReserveInventoryActivity};
