//! Receive order line matching and transfer line reconciliation

use uuid::Uuid;

use super::{receipt_discrepancy, StockLine};
use crate::validation::ValidationFailure;

/// One transfer order line: what was sent and, once received, what arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLineReceipt {
    pub sku_id: Uuid,
    pub batch_id: Uuid,
    pub sent_quantity: i32,
    pub received_quantity: Option<i32>,
}

impl TransferLineReceipt {
    /// A line as dispatched, before any receipt
    pub fn sent(sku_id: Uuid, batch_id: Uuid, sent_quantity: i32) -> Self {
        Self {
            sku_id,
            batch_id,
            sent_quantity,
            received_quantity: None,
        }
    }

    /// Received minus sent; `None` until the line is received
    pub fn discrepancy(&self) -> Option<i32> {
        receipt_discrepancy(self.sent_quantity, self.received_quantity)
    }
}

/// Every received line must correspond to a (sku, batch) line that was sent
/// on the transfer order. Quantities may differ.
pub fn match_receipt_lines(
    sent: &[(Uuid, Uuid)],
    received: &[StockLine],
) -> Result<(), ValidationFailure> {
    for line in received {
        if !sent.contains(&(line.sku_id, line.batch_id)) {
            return Err(ValidationFailure::new(
                "items",
                format!(
                    "sku {} batch {} was not sent on this transfer order",
                    line.sku_id, line.batch_id
                ),
            ));
        }
    }
    Ok(())
}

/// Record a receipt on a transfer order's lines.
///
/// Every received line must match a sent line. Sent lines that the receipt
/// leaves out keep `received_quantity = None`.
pub fn reconcile_receipt(
    lines: &[TransferLineReceipt],
    received: &[StockLine],
) -> Result<Vec<TransferLineReceipt>, ValidationFailure> {
    let sent: Vec<(Uuid, Uuid)> = lines.iter().map(|l| (l.sku_id, l.batch_id)).collect();
    match_receipt_lines(&sent, received)?;

    Ok(lines
        .iter()
        .map(|line| {
            let arrived = received
                .iter()
                .find(|r| r.sku_id == line.sku_id && r.batch_id == line.batch_id)
                .map(|r| r.quantity);
            TransferLineReceipt {
                received_quantity: arrived.or(line.received_quantity),
                ..*line
            }
        })
        .collect())
}
