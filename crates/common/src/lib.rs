//! Shared types for the inventory reservation activity.

pub mod types;

pub use types::RequestId;
