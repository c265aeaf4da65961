//! Purchase order models and status rules

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderError, RequestLine, StockLine, TransferOrderStatus};
use crate::validation::ValidationFailure;

/// Purchase order status. Only transfer and receive activity moves it, and
/// only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Created,
    InTransit,
    Fulfilled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Created => "CREATED",
            PurchaseOrderStatus::InTransit => "IN_TRANSIT",
            PurchaseOrderStatus::Fulfilled => "FULFILLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(PurchaseOrderStatus::Created),
            "IN_TRANSIT" => Some(PurchaseOrderStatus::InTransit),
            "FULFILLED" => Some(PurchaseOrderStatus::Fulfilled),
            _ => None,
        }
    }

    /// Status after a transfer order is dispatched against this PO
    pub fn on_dispatch(self) -> Result<Self, OrderError> {
        match self {
            PurchaseOrderStatus::Created | PurchaseOrderStatus::InTransit => {
                Ok(PurchaseOrderStatus::InTransit)
            }
            PurchaseOrderStatus::Fulfilled => Err(OrderError::PurchaseOrderFulfilled),
        }
    }

    /// Status after one of this PO's transfer orders is received.
    ///
    /// `received` holds, for every transfer order of the PO, whether it now
    /// has a receive order.
    pub fn on_receipt(self, received: &[bool]) -> Self {
        if all_transfers_received(received) {
            PurchaseOrderStatus::Fulfilled
        } else {
            self
        }
    }

    /// Status once the current statuses of all this PO's transfer orders are
    /// known. A transfer is received exactly when it is FULFILLED.
    pub fn on_transfers_received(self, transfers: &[TransferOrderStatus]) -> Self {
        let received: Vec<bool> = transfers
            .iter()
            .map(|s| *s == TransferOrderStatus::Fulfilled)
            .collect();
        self.on_receipt(&received)
    }
}

/// A PO is complete once it has transfers and every one of them is received
pub fn all_transfers_received(received: &[bool]) -> bool {
    !received.is_empty() && received.iter().all(|r| *r)
}

/// Direction of a purchase order.
///
/// The requesting inventory asks for goods and later receives them; the
/// fulfilling inventory dispatches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRoute {
    pub requesting_inventory_id: Uuid,
    pub fulfilling_inventory_id: Uuid,
}

impl PurchaseRoute {
    /// Route of the synthetic PO behind a manual transfer from `sender` to
    /// `receiver`: the receiver is the requester, the sender fulfils.
    pub fn for_manual_transfer(sender: Uuid, receiver: Uuid) -> Self {
        Self {
            requesting_inventory_id: receiver,
            fulfilling_inventory_id: sender,
        }
    }

    /// Inventory a transfer order against this PO ships from
    pub fn sending_inventory(&self) -> Uuid {
        self.fulfilling_inventory_id
    }

    /// Inventory a receive order against this PO's transfers credits
    pub fn receiving_inventory(&self) -> Uuid {
        self.requesting_inventory_id
    }
}

/// Items of the synthetic PO behind a manual transfer: sent quantity summed
/// per SKU, in order of first appearance
pub fn synthetic_request_lines(lines: &[StockLine]) -> Result<Vec<RequestLine>, ValidationFailure> {
    let mut requested: Vec<RequestLine> = Vec::new();
    for line in lines {
        match requested.iter_mut().find(|r| r.sku_id == line.sku_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| {
                        ValidationFailure::new(
                            "items",
                            format!("total quantity for sku {} is too large", line.sku_id),
                        )
                    })?;
            }
            None => requested.push(RequestLine {
                sku_id: line.sku_id,
                quantity: line.quantity,
            }),
        }
    }
    Ok(requested)
}
