//! Reservation and activity error types.

use common::RequestId;
use thiserror::Error;

/// Errors that can occur while reserving inventory.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Stock is lower than the requested amount. Nothing was written.
    #[error(
        "Insufficient inventory for request {request_id}: requested {requested} of '{item}', {available} available"
    )]
    InsufficientInventory {
        request_id: RequestId,
        item: String,
        requested: u32,
        available: u32,
    },

    /// The catalog holds no record for the item.
    #[error("Unknown item '{item}' for request {request_id}")]
    UnknownItem { request_id: RequestId, item: String },

    /// The request violates the activity's input contract.
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    /// The request ID already debited a different item or amount.
    #[error(
        "Request {request_id} already reserved {previous_amount} of '{previous_item}'"
    )]
    RequestIdReused {
        request_id: RequestId,
        previous_item: String,
        previous_amount: u32,
    },

    /// The state store could not complete the reservation.
    #[error("State store unavailable for request {request_id}: {reason}")]
    StoreUnavailable { request_id: RequestId, reason: String },

    /// A stored document could not be decoded.
    #[error("Corrupt record under key '{key}': {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ReservationError {
    /// Returns true if the workflow engine may retry the activity.
    ///
    /// Only store faults are retryable; every other kind is a business or
    /// contract rejection that a retry cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReservationError::StoreUnavailable { .. })
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ReservationError::InsufficientInventory { .. } => "insufficient_inventory",
            ReservationError::UnknownItem { .. } => "unknown_item",
            ReservationError::InvalidRequest(_) => "invalid_request",
            ReservationError::RequestIdReused { .. } => "request_id_reused",
            ReservationError::StoreUnavailable { .. } => "store_unavailable",
            ReservationError::CorruptRecord { .. } => "corrupt_record",
        }
    }
}

/// How the workflow engine should treat a failed activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retrying cannot succeed; route to compensation.
    Terminal,
    /// The failure is transient; the engine may retry per its policy.
    Retryable,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Terminal => write!(f, "terminal"),
            FailureKind::Retryable => write!(f, "retryable"),
        }
    }
}

/// Errors reported to the workflow engine.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// No activity is registered under the requested name.
    #[error("Activity '{0}' is not registered")]
    NotRegistered(String),

    /// The activity ran and failed.
    #[error("Activity '{activity}' failed ({kind}): {message}")]
    Failed {
        activity: String,
        kind: FailureKind,
        message: String,
    },
}

impl ActivityError {
    /// Creates a failure the engine must not retry.
    pub fn terminal(activity: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::Failed {
            activity: activity.into(),
            kind: FailureKind::Terminal,
            message: message.into(),
        }
    }

    /// Creates a failure the engine may retry.
    pub fn retryable(activity: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::Failed {
            activity: activity.into(),
            kind: FailureKind::Retryable,
            message: message.into(),
        }
    }

    /// Returns the failure classification.
    pub fn kind(&self) -> FailureKind {
        match self {
            ActivityError::NotRegistered(_) => FailureKind::Terminal,
            ActivityError::Failed { kind, .. } => *kind,
        }
    }

    /// Returns true if the engine may retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }
}

/// Convenience type alias for reservation results.
pub type Result<T> = std::result::Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_faults_are_retryable() {
        let request_id = RequestId::from("r-1");

        let unavailable = ReservationError::StoreUnavailable {
            request_id: request_id.clone(),
            reason: "timeout".to_string(),
        };
        assert!(unavailable.is_retryable());

        let insufficient = ReservationError::InsufficientInventory {
            request_id: request_id.clone(),
            item: "Cars".to_string(),
            requested: 4,
            available: 3,
        };
        assert!(!insufficient.is_retryable());

        let unknown = ReservationError::UnknownItem {
            request_id,
            item: "Boats".to_string(),
        };
        assert!(!unknown.is_retryable());
        assert_eq!(unknown.reason(), "unknown_item");
    }

    #[test]
    fn insufficient_inventory_message_carries_request_id() {
        let err = ReservationError::InsufficientInventory {
            request_id: RequestId::from("r-9"),
            item: "Cars".to_string(),
            requested: 4,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient inventory for request r-9: requested 4 of 'Cars', 3 available"
        );
    }

    #[test]
    fn not_registered_is_terminal() {
        let err = ActivityError::NotRegistered("Nope".to_string());
        assert_eq!(err.kind(), FailureKind::Terminal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn retryable_constructor_sets_kind() {
        let err = ActivityError::retryable("ReserveInventoryActivity", "store down");
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Activity 'ReserveInventoryActivity' failed (retryable): store down"
        );
    }
}
