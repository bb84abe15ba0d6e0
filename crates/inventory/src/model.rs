//! Request and stored-record types.

use chrono::{DateTime, Utc};
use common::RequestId;
use serde::{Deserialize, Serialize};

use crate::error::{ReservationError, Result};

/// Prefix of the keys holding reservation markers.
pub const RESERVATION_KEY_PREFIX: &str = "reservation||";

/// A request to pay for, and therefore reserve, some quantity of an item.
///
/// Created by the workflow before the activity runs and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Identifier assigned by the workflow; stable across redeliveries.
    pub request_id: RequestId,
    /// Catalog key of the item being bought.
    pub item_being_purchased: String,
    /// Quantity requested.
    pub amount: u32,
    /// Amount of money tendered.
    pub currency: f64,
}

impl PaymentRequest {
    /// Creates a new payment request.
    pub fn new(
        request_id: impl Into<RequestId>,
        item_being_purchased: impl Into<String>,
        amount: u32,
        currency: f64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            item_being_purchased: item_being_purchased.into(),
            amount,
            currency,
        }
    }

    /// Checks the preconditions the workflow engine is supposed to uphold.
    pub fn validate(&self) -> Result<()> {
        if self.request_id.is_blank() {
            return Err(ReservationError::InvalidRequest(
                "requestId must not be empty".to_string(),
            ));
        }
        if self.item_being_purchased.trim().is_empty() {
            return Err(ReservationError::InvalidRequest(format!(
                "request {}: itemBeingPurchased must not be empty",
                self.request_id
            )));
        }
        if self.amount == 0 {
            return Err(ReservationError::InvalidRequest(format!(
                "request {}: amount must be positive",
                self.request_id
            )));
        }
        Ok(())
    }
}

/// Stock level of one catalog item, stored under the item's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    /// Item key.
    pub name: String,
    /// Unit price.
    pub total_cost: f64,
    /// Units in stock.
    pub quantity: u32,
}

/// The workflow sample calls the stored inventory document an order payload.
pub type OrderPayload = InventoryRecord;

impl InventoryRecord {
    /// Creates a new inventory record.
    pub fn new(name: impl Into<String>, total_cost: f64, quantity: u32) -> Self {
        Self {
            name: name.into(),
            total_cost,
            quantity,
        }
    }

    /// Returns the record left after removing `amount` units, or None if
    /// that would take the quantity below zero.
    pub fn debit(&self, amount: u32) -> Option<InventoryRecord> {
        self.quantity
            .checked_sub(amount)
            .map(|quantity| InventoryRecord {
                name: self.name.clone(),
                total_cost: self.total_cost,
                quantity,
            })
    }
}

/// Proof that a request's debit was committed.
///
/// Written in the same transaction as the debit so a redelivered request
/// can be recognised and acknowledged without debiting twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationMarker {
    pub request_id: RequestId,
    pub item: String,
    pub amount: u32,
    pub remaining_quantity: u32,
    pub reserved_at: DateTime<Utc>,
}

impl ReservationMarker {
    /// Creates the marker for `request`, leaving `remaining_quantity` in stock.
    pub fn new(request: &PaymentRequest, remaining_quantity: u32) -> Self {
        Self {
            request_id: request.request_id.clone(),
            item: request.item_being_purchased.clone(),
            amount: request.amount,
            remaining_quantity,
            reserved_at: Utc::now(),
        }
    }

    /// Returns true if the marker was written for the same item and amount.
    pub fn matches(&self, request: &PaymentRequest) -> bool {
        self.item == request.item_being_purchased && self.amount == request.amount
    }
}

/// Returns the state key of the marker for `request_id`.
pub fn marker_key(request_id: &RequestId) -> String {
    format!("{RESERVATION_KEY_PREFIX}{request_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_request_uses_camel_case_wire_format() {
        let json = serde_json::json!({
            "requestId": "r-1",
            "itemBeingPurchased": "Cars",
            "amount": 4,
            "currency": 60000.0
        });

        let request: PaymentRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.request_id.as_str(), "r-1");
        assert_eq!(request.item_being_purchased, "Cars");
        assert_eq!(request.amount, 4);
    }

    #[test]
    fn negative_amount_is_rejected_at_decode() {
        let json = serde_json::json!({
            "requestId": "r-1",
            "itemBeingPurchased": "Cars",
            "amount": -4,
            "currency": 1.0
        });

        assert!(serde_json::from_value::<PaymentRequest>(json).is_err());
    }

    #[test]
    fn validate_rejects_zero_amount() {
        let request = PaymentRequest::new("r-1", "Cars", 0, 1.0);
        assert!(matches!(
            request.validate(),
            Err(ReservationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn validate_rejects_blank_item() {
        let request = PaymentRequest::new("r-1", " ", 1, 1.0);
        assert!(matches!(
            request.validate(),
            Err(ReservationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let request = PaymentRequest::new("r-1", "Cars", 2, 30000.0);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn debit_keeps_name_and_price() {
        let record = InventoryRecord::new("Cars", 15000.0, 10);
        let debited = record.debit(4).unwrap();
        assert_eq!(debited, InventoryRecord::new("Cars", 15000.0, 6));
    }

    #[test]
    fn debit_to_exactly_zero_is_allowed() {
        let record = InventoryRecord::new("Cars", 15000.0, 4);
        assert_eq!(record.debit(4).unwrap().quantity, 0);
    }

    #[test]
    fn debit_below_zero_is_refused() {
        let record = InventoryRecord::new("Cars", 15000.0, 3);
        assert!(record.debit(4).is_none());
    }

    #[test]
    fn inventory_record_wire_format() {
        let record = InventoryRecord::new("Cars", 15000.0, 10);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Cars", "totalCost": 15000.0, "quantity": 10})
        );
    }

    #[test]
    fn marker_matches_same_item_and_amount_only() {
        let request = PaymentRequest::new("r-1", "Cars", 2, 1.0);
        let marker = ReservationMarker::new(&request, 8);

        assert!(marker.matches(&request));
        assert!(!marker.matches(&PaymentRequest::new("r-1", "Cars", 3, 1.0)));
        assert!(!marker.matches(&PaymentRequest::new("r-1", "Bikes", 2, 1.0)));
    }

    #[test]
    fn marker_key_is_prefixed() {
        assert_eq!(marker_key(&RequestId::from("r-1")), "reservation||r-1");
    }
}
