//! Stock cell arithmetic, line items and audit reasons

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::CellKey;

/// A requested change to one stock cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StockChange {
    /// Relative change used by production, transfers and receipts
    Delta(i32),
    /// Overwrite used by the manual stock editor
    Absolute(i32),
}

/// Errors from stock arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: i32, requested: i32 },

    #[error("Stock quantity cannot be set to {0}")]
    NegativeQuantity(i32),

    #[error("Stock quantity out of range")]
    Overflow,
}

impl StockChange {
    /// Compute the new cell quantity from the current one.
    ///
    /// The result is never negative: a delta that would take the cell below
    /// zero yields `Insufficient`, a negative absolute value yields
    /// `NegativeQuantity`.
    pub fn apply(self, current: i32) -> Result<i32, StockError> {
        match self {
            StockChange::Delta(delta) => {
                let new = current.checked_add(delta).ok_or(StockError::Overflow)?;
                if new < 0 {
                    return Err(StockError::Insufficient {
                        available: current,
                        requested: delta.saturating_neg(),
                    });
                }
                Ok(new)
            }
            StockChange::Absolute(value) => {
                if value < 0 {
                    return Err(StockError::NegativeQuantity(value));
                }
                Ok(value)
            }
        }
    }
}

/// SKU and quantity, without batch (PO items, batch production items)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub sku_id: Uuid,
    pub quantity: i32,
}

/// Batch-level line item (TO and RO items)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub sku_id: Uuid,
    pub batch_id: Uuid,
    pub quantity: i32,
}

impl StockLine {
    pub fn cell(&self, inventory_id: Uuid) -> CellKey {
        CellKey::new(inventory_id, self.sku_id, self.batch_id)
    }
}

/// One line that cannot be covered by the stock on hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub batch_id: Uuid,
    pub requested: i32,
    pub available: i32,
}

impl std::fmt::Display for Shortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sku {} batch {}: {} requested, {} available",
            self.sku_id, self.batch_id, self.requested, self.available
        )
    }
}

/// Check every dispatch line against the stock at the sending inventory and
/// return the planned decrements, or every line that is short.
///
/// Nothing is planned unless all lines are covered.
pub fn plan_dispatch<F>(
    sending_inventory: Uuid,
    lines: &[StockLine],
    available: F,
) -> Result<Vec<(CellKey, StockChange)>, Vec<Shortage>>
where
    F: Fn(&CellKey) -> i32,
{
    let shortages: Vec<Shortage> = lines
        .iter()
        .filter_map(|line| {
            let key = line.cell(sending_inventory);
            let on_hand = available(&key);
            (on_hand < line.quantity).then(|| Shortage {
                inventory_id: sending_inventory,
                sku_id: line.sku_id,
                batch_id: line.batch_id,
                requested: line.quantity,
                available: on_hand,
            })
        })
        .collect();

    if !shortages.is_empty() {
        return Err(shortages);
    }

    Ok(lines
        .iter()
        .map(|line| (line.cell(sending_inventory), StockChange::Delta(-line.quantity)))
        .collect())
}

/// Planned increments at the receiving inventory
pub fn plan_receipt(receiving_inventory: Uuid, lines: &[StockLine]) -> Vec<(CellKey, StockChange)> {
    lines
        .iter()
        .map(|line| (line.cell(receiving_inventory), StockChange::Delta(line.quantity)))
        .collect()
}

/// One batch row in a per-SKU stock view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub sku_id: Uuid,
    pub sku_code: String,
    pub sku_name: String,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub quantity: i32,
}

/// Batch quantity within a SKU group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStock {
    pub batch_id: Uuid,
    pub batch_code: String,
    pub quantity: i32,
}

/// Stock of one SKU at one inventory, split by batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuStock {
    pub sku_id: Uuid,
    pub sku_code: String,
    pub sku_name: String,
    pub total_quantity: i64,
    pub batches: Vec<BatchStock>,
}

/// Group batch cells per SKU, dropping empty cells, ordered by SKU code then
/// batch code
pub fn group_by_sku(mut levels: Vec<StockLevel>) -> Vec<SkuStock> {
    levels.retain(|l| l.quantity > 0);
    levels.sort_by(|a, b| {
        a.sku_code
            .cmp(&b.sku_code)
            .then_with(|| a.batch_code.cmp(&b.batch_code))
    });

    let mut grouped: Vec<SkuStock> = Vec::new();
    for level in levels {
        let batch = BatchStock {
            batch_id: level.batch_id,
            batch_code: level.batch_code,
            quantity: level.quantity,
        };
        match grouped.last_mut() {
            Some(group) if group.sku_id == level.sku_id => {
                group.total_quantity += i64::from(batch.quantity);
                group.batches.push(batch);
            }
            _ => grouped.push(SkuStock {
                sku_id: level.sku_id,
                sku_code: level.sku_code,
                sku_name: level.sku_name,
                total_quantity: i64::from(batch.quantity),
                batches: vec![batch],
            }),
        }
    }
    grouped
}

/// History reason for stock created by production
pub fn production_reason(batch_code: &str) -> String {
    format!("Production batch {} created", batch_code)
}

/// History reason for stock leaving the sender on a transfer
pub fn transfer_sent_reason(to_number: &str) -> String {
    format!("Transfer Order {} (sent out)", to_number)
}

/// History reason for stock accepted against a transfer order
pub fn receive_from_transfer_reason(ro_number: &str) -> String {
    format!("Receive Order {} from Transfer Order", ro_number)
}

/// History reason for stock accepted without a transfer order
pub fn manual_receipt_reason(ro_number: &str) -> String {
    format!("Receive Order {} (manual receipt)", ro_number)
}
