//! Input validation for stock documents
//!
//! Everything here runs before a transaction is opened, so a rejected request
//! never touches the ledger.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{RequestLine, StockLine};

/// Minimum length of a manual stock edit reason, after trimming
pub const MIN_REASON_LEN: usize = 3;

/// A rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Source and destination of a movement must differ
pub fn validate_distinct_inventories(from: Uuid, to: Uuid) -> Result<(), ValidationFailure> {
    if from == to {
        return Err(ValidationFailure::new(
            "to_inventory_id",
            "Source and destination inventory must differ",
        ));
    }
    Ok(())
}

/// SKU-level lines: at least one, each quantity >= 1, no SKU twice
pub fn validate_request_lines(lines: &[RequestLine]) -> Result<(), ValidationFailure> {
    if lines.is_empty() {
        return Err(ValidationFailure::new("items", "At least one item is required"));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity < 1 {
            return Err(ValidationFailure::new("quantity", "Quantity must be at least 1"));
        }
        if !seen.insert(line.sku_id) {
            return Err(ValidationFailure::new(
                "items",
                format!("SKU {} appears more than once", line.sku_id),
            ));
        }
    }
    Ok(())
}

/// Batch-level lines: at least one, each quantity >= 1, no (SKU, batch) twice
pub fn validate_stock_lines(lines: &[StockLine]) -> Result<(), ValidationFailure> {
    if lines.is_empty() {
        return Err(ValidationFailure::new("items", "At least one item is required"));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity < 1 {
            return Err(ValidationFailure::new("quantity", "Quantity must be at least 1"));
        }
        if !seen.insert((line.sku_id, line.batch_id)) {
            return Err(ValidationFailure::new(
                "items",
                format!("SKU {} batch {} appears more than once", line.sku_id, line.batch_id),
            ));
        }
    }
    Ok(())
}

/// Manual edit reason, at least three characters once trimmed
pub fn validate_reason(reason: &str) -> Result<(), ValidationFailure> {
    if reason.trim().chars().count() < MIN_REASON_LEN {
        return Err(ValidationFailure::new(
            "reason",
            format!("Reason must be at least {} characters", MIN_REASON_LEN),
        ));
    }
    Ok(())
}

/// Absolute stock values cannot be negative
pub fn validate_absolute_quantity(quantity: i32) -> Result<(), ValidationFailure> {
    if quantity < 0 {
        return Err(ValidationFailure::new("quantity", "Quantity cannot be negative"));
    }
    Ok(())
}
