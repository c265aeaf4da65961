//! Inventory and SKU reference models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock-holding location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryKind {
    /// Production site, the only place batches are created
    Production,
    Hub,
    Store,
}

impl InventoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryKind::Production => "PRODUCTION",
            InventoryKind::Hub => "HUB",
            InventoryKind::Store => "STORE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PRODUCTION" => Some(InventoryKind::Production),
            "HUB" => Some(InventoryKind::Hub),
            "STORE" => Some(InventoryKind::Store),
            _ => None,
        }
    }
}

/// Resolved inventory for display alongside documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// Resolved SKU for display alongside documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}
