//! Receive order service
//!
//! A receipt credits the receiving inventory with what actually arrived.
//! Received quantities may differ from what was sent; the difference stays
//! visible on the transfer order and is never corrected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    manual_receipt_reason, plan_receipt, receive_from_transfer_reason, reconcile_receipt,
    validate_distinct_inventories, validate_stock_lines, CellKey, DocumentKind, InventoryRef,
    SkuRef, StockChange, StockLine, TransferLineReceipt,
};

use crate::error::{AppError, AppResult};
use crate::services::transfer_order::{self, BatchRef};
use crate::services::{master_data, purchase_order, sequence, stock_ledger};

/// Receive order service
#[derive(Clone)]
pub struct ReceiveOrderService {
    db: PgPool,
}

/// Input for receiving a transfer order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReceiveFromToInput {
    pub transfer_order_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<StockLine>,
}

/// Input for receiving goods that arrived without a transfer order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateManualReceiveInput {
    pub from_inventory_id: Uuid,
    /// Inventory credited with the goods
    pub to_inventory_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<StockLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOrderRef {
    pub id: Uuid,
    pub to_number: String,
}

/// Receive order with resolved route and items
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveOrderDetail {
    pub id: Uuid,
    pub ro_number: String,
    pub transfer_order: Option<TransferOrderRef>,
    pub from_inventory: Option<InventoryRef>,
    pub to_inventory: InventoryRef,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReceiveOrderItemDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiveOrderItemDetail {
    pub sku: SkuRef,
    pub batch: BatchRef,
    pub received_quantity: i32,
}

#[derive(Debug, FromRow)]
struct ReceiveOrderRow {
    id: Uuid,
    ro_number: String,
    transfer_order_id: Option<Uuid>,
    to_number: Option<String>,
    from_inventory_id: Option<Uuid>,
    from_code: Option<String>,
    from_name: Option<String>,
    to_inventory_id: Uuid,
    to_code: String,
    to_name: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReceiveOrderItemRow {
    receive_order_id: Uuid,
    sku_id: Uuid,
    sku_code: String,
    sku_name: String,
    batch_id: Uuid,
    batch_code: String,
    received_quantity: i32,
}

// Receipts against a transfer order take their route from its purchase order
const RECEIVE_ORDER_SELECT: &str = r#"
    SELECT ro.id, ro.ro_number, ro.transfer_order_id, t.to_number,
           fi.id AS from_inventory_id, fi.code AS from_code, fi.name AS from_name,
           ti.id AS to_inventory_id, ti.code AS to_code, ti.name AS to_name,
           ro.created_by, ro.created_at
    FROM receive_orders ro
    LEFT JOIN transfer_orders t ON t.id = ro.transfer_order_id
    LEFT JOIN purchase_orders po ON po.id = t.purchase_order_id
    LEFT JOIN inventories fi
        ON fi.id = COALESCE(ro.from_inventory_id, po.fulfilling_inventory_id)
    JOIN inventories ti
        ON ti.id = COALESCE(ro.to_inventory_id, po.requesting_inventory_id)
"#;

impl ReceiveOrderService {
    /// Create a new ReceiveOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Receive a transfer order at its purchase order's requesting inventory.
    /// Marks the TO FULFILLED, and the PO too once all its TOs are received.
    pub async fn create_from_to(
        &self,
        user_id: Uuid,
        input: CreateReceiveFromToInput,
    ) -> AppResult<ReceiveOrderDetail> {
        validate_stock_lines(&input.items)?;
        input.validate()?;
        ensure_line_references(&self.db, &input.items).await?;

        let mut tx = self.db.begin().await?;

        let transfer = transfer_order::lock_transfer_order(&mut *tx, input.transfer_order_id).await?;
        let next_transfer_status = transfer.status.on_receipt()?;
        let po = purchase_order::lock_purchase_order(&mut *tx, transfer.purchase_order_id).await?;
        let receiving_inventory = po.route.receiving_inventory();

        let sent = sqlx::query_as::<_, (Uuid, Uuid, i32)>(
            r#"
            SELECT sku_id, batch_id, sent_quantity
            FROM transfer_order_items
            WHERE transfer_order_id = $1
            "#,
        )
        .bind(transfer.id)
        .fetch_all(&mut *tx)
        .await?;

        let sent_lines: Vec<TransferLineReceipt> = sent
            .into_iter()
            .map(|(sku_id, batch_id, quantity)| TransferLineReceipt::sent(sku_id, batch_id, quantity))
            .collect();
        let reconciled = reconcile_receipt(&sent_lines, &input.items)?;

        let ro_number = sequence::next_code(&mut *tx, DocumentKind::ReceiveOrder).await?;
        let ro_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO receive_orders (ro_number, transfer_order_id, created_by)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&ro_number)
        .bind(transfer.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let reason = receive_from_transfer_reason(&ro_number);
        credit_lines(&mut *tx, ro_id, receiving_inventory, &input.items, user_id, &reason).await?;

        for line in &reconciled {
            let Some(received_quantity) = line.received_quantity else {
                continue;
            };
            sqlx::query(
                r#"
                UPDATE transfer_order_items
                SET received_quantity = $4
                WHERE transfer_order_id = $1 AND sku_id = $2 AND batch_id = $3
                "#,
            )
            .bind(transfer.id)
            .bind(line.sku_id)
            .bind(line.batch_id)
            .bind(received_quantity)
            .execute(&mut *tx)
            .await?;

            if line.discrepancy() != Some(0) {
                tracing::warn!(
                    transfer_order_id = %transfer.id,
                    sku_id = %line.sku_id,
                    batch_id = %line.batch_id,
                    sent = line.sent_quantity,
                    received = received_quantity,
                    "Receipt differs from quantity sent"
                );
            }
        }

        sqlx::query("UPDATE transfer_orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(transfer.id)
            .bind(next_transfer_status.as_str())
            .execute(&mut *tx)
            .await?;

        let transfer_statuses = sqlx::query_scalar::<_, String>(
            "SELECT status FROM transfer_orders WHERE purchase_order_id = $1",
        )
        .bind(po.id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|s| purchase_order::parse_transfer_status(s))
        .collect::<AppResult<Vec<_>>>()?;

        let next_po_status = po.status.on_transfers_received(&transfer_statuses);
        if next_po_status != po.status {
            purchase_order::update_status(&mut *tx, po.id, next_po_status).await?;
        }

        tx.commit().await?;

        tracing::info!(
            receive_order_id = %ro_id,
            ro_number = %ro_number,
            transfer_order_id = %transfer.id,
            to_number = %transfer.to_number,
            purchase_order_status = next_po_status.as_str(),
            "Receive order created"
        );

        self.get_ro(ro_id).await
    }

    /// Receive goods with no transfer order behind them
    pub async fn create_manual(
        &self,
        user_id: Uuid,
        input: CreateManualReceiveInput,
    ) -> AppResult<ReceiveOrderDetail> {
        validate_distinct_inventories(input.from_inventory_id, input.to_inventory_id)?;
        validate_stock_lines(&input.items)?;
        input.validate()?;

        master_data::inventory_kind(&self.db, input.from_inventory_id).await?;
        master_data::inventory_kind(&self.db, input.to_inventory_id).await?;
        ensure_line_references(&self.db, &input.items).await?;

        let mut tx = self.db.begin().await?;

        let ro_number = sequence::next_code(&mut *tx, DocumentKind::ReceiveOrder).await?;
        let ro_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO receive_orders (ro_number, from_inventory_id, to_inventory_id, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&ro_number)
        .bind(input.from_inventory_id)
        .bind(input.to_inventory_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let reason = manual_receipt_reason(&ro_number);
        credit_lines(&mut *tx, ro_id, input.to_inventory_id, &input.items, user_id, &reason).await?;

        tx.commit().await?;

        tracing::info!(
            receive_order_id = %ro_id,
            ro_number = %ro_number,
            from_inventory_id = %input.from_inventory_id,
            to_inventory_id = %input.to_inventory_id,
            "Manual receive order created"
        );

        self.get_ro(ro_id).await
    }

    /// List receive orders, newest first
    pub async fn list_ros(&self) -> AppResult<Vec<ReceiveOrderDetail>> {
        let query = format!("{} ORDER BY ro.created_at DESC", RECEIVE_ORDER_SELECT);
        let rows = sqlx::query_as::<_, ReceiveOrderRow>(&query)
            .fetch_all(&self.db)
            .await?;

        self.attach_items(rows).await
    }

    /// Get one receive order
    pub async fn get_ro(&self, ro_id: Uuid) -> AppResult<ReceiveOrderDetail> {
        let query = format!("{} WHERE ro.id = $1", RECEIVE_ORDER_SELECT);
        let row = sqlx::query_as::<_, ReceiveOrderRow>(&query)
            .bind(ro_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Receive order".to_string()))?;

        let mut details = self.attach_items(vec![row]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::NotFound("Receive order".to_string()))
    }

    async fn attach_items(&self, rows: Vec<ReceiveOrderRow>) -> AppResult<Vec<ReceiveOrderDetail>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let items = sqlx::query_as::<_, ReceiveOrderItemRow>(
            r#"
            SELECT ri.receive_order_id, ri.sku_id, s.code AS sku_code, s.name AS sku_name,
                   ri.batch_id, b.code AS batch_code, ri.received_quantity
            FROM receive_order_items ri
            JOIN skus s ON s.id = ri.sku_id
            JOIN batches b ON b.id = ri.batch_id
            WHERE ri.receive_order_id = ANY($1)
            ORDER BY s.code, b.code
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items
                    .iter()
                    .filter(|i| i.receive_order_id == row.id)
                    .map(|i| ReceiveOrderItemDetail {
                        sku: SkuRef {
                            id: i.sku_id,
                            code: i.sku_code.clone(),
                            name: i.sku_name.clone(),
                        },
                        batch: BatchRef {
                            id: i.batch_id,
                            code: i.batch_code.clone(),
                        },
                        received_quantity: i.received_quantity,
                    })
                    .collect();

                let transfer_order = row
                    .transfer_order_id
                    .zip(row.to_number)
                    .map(|(id, to_number)| TransferOrderRef { id, to_number });

                let from_inventory = match (row.from_inventory_id, row.from_code, row.from_name) {
                    (Some(id), Some(code), Some(name)) => Some(InventoryRef { id, code, name }),
                    _ => None,
                };

                ReceiveOrderDetail {
                    id: row.id,
                    ro_number: row.ro_number,
                    transfer_order,
                    from_inventory,
                    to_inventory: InventoryRef {
                        id: row.to_inventory_id,
                        code: row.to_code,
                        name: row.to_name,
                    },
                    created_by: row.created_by,
                    created_at: row.created_at,
                    items,
                }
            })
            .collect())
    }
}

async fn ensure_line_references(db: &PgPool, items: &[StockLine]) -> AppResult<()> {
    let sku_ids: Vec<Uuid> = items.iter().map(|i| i.sku_id).collect();
    master_data::ensure_skus(db, &sku_ids).await?;
    let batch_ids: Vec<Uuid> = items.iter().map(|i| i.batch_id).collect();
    master_data::ensure_batches(db, &batch_ids).await
}

/// Write the RO items and credit each line at the receiving inventory
async fn credit_lines(
    conn: &mut PgConnection,
    ro_id: Uuid,
    receiving_inventory: Uuid,
    items: &[StockLine],
    user_id: Uuid,
    reason: &str,
) -> AppResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO receive_order_items (receive_order_id, sku_id, batch_id, received_quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(ro_id)
        .bind(item.sku_id)
        .bind(item.batch_id)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }

    let mut plan: Vec<(CellKey, StockChange)> = plan_receipt(receiving_inventory, items);
    plan.sort_by_key(|(key, _)| *key);
    for (key, change) in plan {
        stock_ledger::apply_change(&mut *conn, key, change, user_id, reason).await?;
    }
    Ok(())
}
