//! Transfer order models and status rules

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Transfer order status: CREATED until a receive order is made against it.
/// There is no way back and no cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferOrderStatus {
    Created,
    Fulfilled,
}

impl TransferOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOrderStatus::Created => "CREATED",
            TransferOrderStatus::Fulfilled => "FULFILLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(TransferOrderStatus::Created),
            "FULFILLED" => Some(TransferOrderStatus::Fulfilled),
            _ => None,
        }
    }

    /// Status after a receive order is created against this transfer
    pub fn on_receipt(self) -> Result<Self, OrderError> {
        match self {
            TransferOrderStatus::Created => Ok(TransferOrderStatus::Fulfilled),
            TransferOrderStatus::Fulfilled => Err(OrderError::TransferAlreadyReceived),
        }
    }
}

/// Received minus sent for a transfer line, once it has been received.
/// Negative means loss in transit.
pub fn receipt_discrepancy(sent_quantity: i32, received_quantity: Option<i32>) -> Option<i32> {
    received_quantity.map(|received| received - sent_quantity)
}
