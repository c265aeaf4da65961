//! Production batch models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RequestLine;
use crate::types::CellKey;

/// A production lot. Its id travels with the stock across inventories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    /// Sequential code (e.g. "B001")
    pub code: String,
    /// Inventory where the batch was produced
    pub inventory_id: Uuid,
    pub production_date: NaiveDate,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Cells credited when a batch is produced at `inventory_id`
pub fn production_cells(inventory_id: Uuid, batch_id: Uuid, items: &[RequestLine]) -> Vec<(CellKey, i32)> {
    items
        .iter()
        .map(|item| (CellKey::new(inventory_id, item.sku_id, batch_id), item.quantity))
        .collect()
}
