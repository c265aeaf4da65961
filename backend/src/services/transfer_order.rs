//! Transfer order service
//!
//! Dispatching goods is all-or-nothing: every line is checked against the
//! locked sending cells before any of them is decremented, and the whole
//! creation is one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    plan_dispatch, receipt_discrepancy, synthetic_request_lines, transfer_sent_reason,
    validate_distinct_inventories, validate_stock_lines, CellKey, DocumentKind, InventoryRef,
    PurchaseOrderStatus, PurchaseRoute, SkuRef, StockChange, StockLine, TransferOrderStatus,
};

use crate::error::{AppError, AppResult};
use crate::services::purchase_order::{self, parse_transfer_status};
use crate::services::{master_data, sequence, stock_ledger};

/// Transfer order service
#[derive(Clone)]
pub struct TransferOrderService {
    db: PgPool,
}

/// Input for dispatching against an existing purchase order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferFromPoInput {
    pub purchase_order_id: Uuid,
    pub employee_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<StockLine>,
}

/// Input for a transfer without a prior purchase order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateManualTransferInput {
    /// Sending inventory
    pub from_inventory_id: Uuid,
    /// Receiving inventory
    pub to_inventory_id: Uuid,
    pub employee_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<StockLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferOrderFilter {
    pub status: Option<TransferOrderStatus>,
    pub purchase_order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderRef {
    pub id: Uuid,
    pub po_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRef {
    pub id: Uuid,
    pub code: String,
}

/// Transfer order with route, items and receipt state
#[derive(Debug, Clone, Serialize)]
pub struct TransferOrderDetail {
    pub id: Uuid,
    pub to_number: String,
    pub purchase_order: PurchaseOrderRef,
    pub sending_inventory: InventoryRef,
    pub receiving_inventory: InventoryRef,
    pub employee: EmployeeRef,
    pub status: TransferOrderStatus,
    pub receive_order_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<TransferOrderItemDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOrderItemDetail {
    pub sku: SkuRef,
    pub batch: BatchRef,
    pub sent_quantity: i32,
    pub received_quantity: Option<i32>,
    /// received - sent, once received
    pub discrepancy: Option<i32>,
}

/// Locked view of a TO used while receiving it
#[derive(Debug, Clone)]
pub struct LockedTransferOrder {
    pub id: Uuid,
    pub to_number: String,
    pub purchase_order_id: Uuid,
    pub status: TransferOrderStatus,
}

#[derive(Debug, FromRow)]
struct TransferOrderRow {
    id: Uuid,
    to_number: String,
    purchase_order_id: Uuid,
    po_number: String,
    sending_inventory_id: Uuid,
    sending_code: String,
    sending_name: String,
    receiving_inventory_id: Uuid,
    receiving_code: String,
    receiving_name: String,
    employee_id: Uuid,
    employee_name: String,
    status: String,
    receive_order_id: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TransferOrderItemRow {
    transfer_order_id: Uuid,
    sku_id: Uuid,
    sku_code: String,
    sku_name: String,
    batch_id: Uuid,
    batch_code: String,
    sent_quantity: i32,
    received_quantity: Option<i32>,
}

const TRANSFER_ORDER_SELECT: &str = r#"
    SELECT t.id, t.to_number, t.purchase_order_id, po.po_number,
           po.fulfilling_inventory_id AS sending_inventory_id,
           fi.code AS sending_code, fi.name AS sending_name,
           po.requesting_inventory_id AS receiving_inventory_id,
           ri.code AS receiving_code, ri.name AS receiving_name,
           t.employee_id, e.name AS employee_name,
           t.status, ro.id AS receive_order_id,
           t.created_by, t.created_at, t.updated_at
    FROM transfer_orders t
    JOIN purchase_orders po ON po.id = t.purchase_order_id
    JOIN inventories fi ON fi.id = po.fulfilling_inventory_id
    JOIN inventories ri ON ri.id = po.requesting_inventory_id
    JOIN employees e ON e.id = t.employee_id
    LEFT JOIN receive_orders ro ON ro.transfer_order_id = t.id
"#;

impl TransferOrderService {
    /// Create a new TransferOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Ship goods against a purchase order from its fulfilling inventory
    pub async fn create_from_po(
        &self,
        user_id: Uuid,
        input: CreateTransferFromPoInput,
    ) -> AppResult<TransferOrderDetail> {
        validate_stock_lines(&input.items)?;
        input.validate()?;
        self.ensure_references(input.employee_id, &input.items).await?;

        let mut tx = self.db.begin().await?;

        let po = purchase_order::lock_purchase_order(&mut *tx, input.purchase_order_id).await?;
        let next_status = po.status.on_dispatch()?;
        let sending_inventory = po.route.sending_inventory();

        let plan = reserve_stock(&mut *tx, sending_inventory, &input.items).await?;
        let (to_id, to_number) =
            write_transfer(&mut *tx, po.id, input.employee_id, &plan, &input.items, user_id).await?;
        purchase_order::update_status(&mut *tx, po.id, next_status).await?;

        tx.commit().await?;

        tracing::info!(
            transfer_order_id = %to_id,
            to_number = %to_number,
            purchase_order_id = %po.id,
            po_number = %po.po_number,
            sending_inventory_id = %sending_inventory,
            items = input.items.len(),
            "Transfer order created"
        );

        self.get_to(to_id).await
    }

    /// Ship goods without a prior purchase order. A purchase order is created
    /// alongside, already IN_TRANSIT, with the receiver as its requester.
    pub async fn create_manual(
        &self,
        user_id: Uuid,
        input: CreateManualTransferInput,
    ) -> AppResult<TransferOrderDetail> {
        validate_distinct_inventories(input.from_inventory_id, input.to_inventory_id)?;
        validate_stock_lines(&input.items)?;
        input.validate()?;
        let requested = synthetic_request_lines(&input.items)?;

        master_data::inventory_kind(&self.db, input.from_inventory_id).await?;
        master_data::inventory_kind(&self.db, input.to_inventory_id).await?;
        self.ensure_references(input.employee_id, &input.items).await?;

        let route = PurchaseRoute::for_manual_transfer(input.from_inventory_id, input.to_inventory_id);

        let mut tx = self.db.begin().await?;

        let plan = reserve_stock(&mut *tx, route.sending_inventory(), &input.items).await?;
        let (po_id, po_number) = purchase_order::insert_purchase_order(
            &mut *tx,
            route,
            PurchaseOrderStatus::InTransit,
            &requested,
            user_id,
        )
        .await?;
        let (to_id, to_number) =
            write_transfer(&mut *tx, po_id, input.employee_id, &plan, &input.items, user_id).await?;

        tx.commit().await?;

        tracing::info!(
            transfer_order_id = %to_id,
            to_number = %to_number,
            purchase_order_id = %po_id,
            po_number = %po_number,
            from_inventory_id = %input.from_inventory_id,
            to_inventory_id = %input.to_inventory_id,
            "Manual transfer order created"
        );

        self.get_to(to_id).await
    }

    /// List transfer orders, newest first
    pub async fn list_tos(&self, filter: TransferOrderFilter) -> AppResult<Vec<TransferOrderDetail>> {
        let query = format!(
            r#"{}
            WHERE ($1::varchar IS NULL OR t.status = $1)
              AND ($2::uuid IS NULL OR t.purchase_order_id = $2)
            ORDER BY t.created_at DESC"#,
            TRANSFER_ORDER_SELECT
        );
        let rows = sqlx::query_as::<_, TransferOrderRow>(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.purchase_order_id)
            .fetch_all(&self.db)
            .await?;

        self.attach_items(rows).await
    }

    /// Get one transfer order
    pub async fn get_to(&self, to_id: Uuid) -> AppResult<TransferOrderDetail> {
        let query = format!("{} WHERE t.id = $1", TRANSFER_ORDER_SELECT);
        let row = sqlx::query_as::<_, TransferOrderRow>(&query)
            .bind(to_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))?;

        let mut details = self.attach_items(vec![row]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))
    }

    async fn ensure_references(&self, employee_id: Uuid, items: &[StockLine]) -> AppResult<()> {
        master_data::ensure_employee(&self.db, employee_id).await?;
        let sku_ids: Vec<Uuid> = items.iter().map(|i| i.sku_id).collect();
        master_data::ensure_skus(&self.db, &sku_ids).await?;
        let batch_ids: Vec<Uuid> = items.iter().map(|i| i.batch_id).collect();
        master_data::ensure_batches(&self.db, &batch_ids).await
    }

    async fn attach_items(&self, rows: Vec<TransferOrderRow>) -> AppResult<Vec<TransferOrderDetail>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let items = sqlx::query_as::<_, TransferOrderItemRow>(
            r#"
            SELECT ti.transfer_order_id, ti.sku_id, s.code AS sku_code, s.name AS sku_name,
                   ti.batch_id, b.code AS batch_code, ti.sent_quantity, ti.received_quantity
            FROM transfer_order_items ti
            JOIN skus s ON s.id = ti.sku_id
            JOIN batches b ON b.id = ti.batch_id
            WHERE ti.transfer_order_id = ANY($1)
            ORDER BY s.code, b.code
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let items = items
                    .iter()
                    .filter(|i| i.transfer_order_id == row.id)
                    .map(|i| TransferOrderItemDetail {
                        sku: SkuRef {
                            id: i.sku_id,
                            code: i.sku_code.clone(),
                            name: i.sku_name.clone(),
                        },
                        batch: BatchRef {
                            id: i.batch_id,
                            code: i.batch_code.clone(),
                        },
                        sent_quantity: i.sent_quantity,
                        received_quantity: i.received_quantity,
                        discrepancy: receipt_discrepancy(i.sent_quantity, i.received_quantity),
                    })
                    .collect();

                Ok(TransferOrderDetail {
                    id: row.id,
                    to_number: row.to_number,
                    purchase_order: PurchaseOrderRef {
                        id: row.purchase_order_id,
                        po_number: row.po_number,
                    },
                    sending_inventory: InventoryRef {
                        id: row.sending_inventory_id,
                        code: row.sending_code,
                        name: row.sending_name,
                    },
                    receiving_inventory: InventoryRef {
                        id: row.receiving_inventory_id,
                        code: row.receiving_code,
                        name: row.receiving_name,
                    },
                    employee: EmployeeRef {
                        id: row.employee_id,
                        name: row.employee_name,
                    },
                    status: parse_transfer_status(&row.status)?,
                    receive_order_id: row.receive_order_id,
                    created_by: row.created_by,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                    items,
                })
            })
            .collect()
    }
}

/// Lock the sending cells in key order and check every line against them.
/// Fails with all shortages at once; nothing is written either way.
async fn reserve_stock(
    conn: &mut PgConnection,
    sending_inventory: Uuid,
    items: &[StockLine],
) -> AppResult<Vec<(CellKey, StockChange)>> {
    let mut keys: Vec<CellKey> = items.iter().map(|i| i.cell(sending_inventory)).collect();
    keys.sort();

    let mut on_hand = BTreeMap::new();
    for key in keys {
        let quantity = stock_ledger::lock_cell(&mut *conn, key).await?;
        on_hand.insert(key, quantity);
    }

    plan_dispatch(sending_inventory, items, |key| {
        on_hand.get(key).copied().unwrap_or(0)
    })
    .map_err(|shortages| {
        for shortage in &shortages {
            tracing::warn!(
                inventory_id = %shortage.inventory_id,
                sku_id = %shortage.sku_id,
                batch_id = %shortage.batch_id,
                requested = shortage.requested,
                available = shortage.available,
                "Insufficient stock for transfer"
            );
        }
        AppError::InsufficientStock(shortages)
    })
}

/// Write the TO, its items and the planned decrements
async fn write_transfer(
    conn: &mut PgConnection,
    po_id: Uuid,
    employee_id: Uuid,
    plan: &[(CellKey, StockChange)],
    items: &[StockLine],
    user_id: Uuid,
) -> AppResult<(Uuid, String)> {
    let to_number = sequence::next_code(&mut *conn, DocumentKind::TransferOrder).await?;

    let to_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO transfer_orders (to_number, purchase_order_id, employee_id, status, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&to_number)
    .bind(po_id)
    .bind(employee_id)
    .bind(TransferOrderStatus::Created.as_str())
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let reason = transfer_sent_reason(&to_number);
    for (key, change) in plan {
        stock_ledger::apply_change(&mut *conn, *key, *change, user_id, &reason).await?;
    }

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO transfer_order_items (transfer_order_id, sku_id, batch_id, sent_quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(to_id)
        .bind(item.sku_id)
        .bind(item.batch_id)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok((to_id, to_number))
}

/// Lock a TO row for the rest of the transaction
pub async fn lock_transfer_order(conn: &mut PgConnection, to_id: Uuid) -> AppResult<LockedTransferOrder> {
    let (id, to_number, purchase_order_id, status) =
        sqlx::query_as::<_, (Uuid, String, Uuid, String)>(
            r#"
            SELECT id, to_number, purchase_order_id, status
            FROM transfer_orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(to_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer order".to_string()))?;

    Ok(LockedTransferOrder {
        id,
        to_number,
        purchase_order_id,
        status: parse_transfer_status(&status)?,
    })
}
