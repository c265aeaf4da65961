//! Common types used across the platform

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of a stock cell: one (inventory, SKU, batch) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub batch_id: Uuid,
}

impl CellKey {
    pub fn new(inventory_id: Uuid, sku_id: Uuid, batch_id: Uuid) -> Self {
        Self {
            inventory_id,
            sku_id,
            batch_id,
        }
    }
}

/// Documents that carry a sequential human-readable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Batch,
    PurchaseOrder,
    TransferOrder,
    ReceiveOrder,
}

impl DocumentKind {
    /// Key of the counter row in `document_sequences`
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Batch => "batch",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::TransferOrder => "transfer_order",
            DocumentKind::ReceiveOrder => "receive_order",
        }
    }

    /// Format a sequence value as a document code (e.g. "B001", "TO-00042")
    pub fn format_code(&self, sequence: i64) -> String {
        match self {
            DocumentKind::Batch => format!("B{:03}", sequence),
            DocumentKind::PurchaseOrder => format!("PO-{:05}", sequence),
            DocumentKind::TransferOrder => format!("TO-{:05}", sequence),
            DocumentKind::ReceiveOrder => format!("RO-{:05}", sequence),
        }
    }
}
