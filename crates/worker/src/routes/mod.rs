//! HTTP route handlers.

pub mod activities;
pub mod inventory;
pub mod observability;
