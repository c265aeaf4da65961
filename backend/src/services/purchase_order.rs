//! Purchase order service
//!
//! Creating a PO writes metadata only. Its status is never set by callers;
//! transfer and receive orders move it forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    validate_distinct_inventories, validate_request_lines, DocumentKind, InventoryRef,
    PurchaseOrderStatus, PurchaseRoute, RequestLine, SkuRef, TransferOrderStatus,
};

use crate::error::{AppError, AppResult};
use crate::services::{master_data, sequence};

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    /// Inventory asking for the goods
    #[serde(alias = "from_inventory_id")]
    pub requesting_inventory_id: Uuid,
    /// Inventory expected to ship them
    #[serde(alias = "to_inventory_id")]
    pub fulfilling_inventory_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<RequestLine>,
}

/// Purchase order with resolved inventories, items and transfers
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetail {
    pub id: Uuid,
    pub po_number: String,
    pub requesting_inventory: InventoryRef,
    pub fulfilling_inventory: InventoryRef,
    pub status: PurchaseOrderStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<PurchaseOrderItemDetail>,
    pub transfer_orders: Vec<TransferOrderSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderItemDetail {
    pub sku: SkuRef,
    pub requested_quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOrderSummary {
    pub id: Uuid,
    pub to_number: String,
    pub status: TransferOrderStatus,
}

/// Locked view of a PO used while dispatching or receiving against it
#[derive(Debug, Clone)]
pub struct LockedPurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub route: PurchaseRoute,
    pub status: PurchaseOrderStatus,
}

#[derive(Debug, FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    po_number: String,
    requesting_inventory_id: Uuid,
    requesting_code: String,
    requesting_name: String,
    fulfilling_inventory_id: Uuid,
    fulfilling_code: String,
    fulfilling_name: String,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PurchaseOrderItemRow {
    purchase_order_id: Uuid,
    sku_id: Uuid,
    sku_code: String,
    sku_name: String,
    requested_quantity: i32,
}

#[derive(Debug, FromRow)]
struct TransferSummaryRow {
    id: Uuid,
    purchase_order_id: Uuid,
    to_number: String,
    status: String,
}

const PURCHASE_ORDER_SELECT: &str = r#"
    SELECT po.id, po.po_number,
           po.requesting_inventory_id, ri.code AS requesting_code, ri.name AS requesting_name,
           po.fulfilling_inventory_id, fi.code AS fulfilling_code, fi.name AS fulfilling_name,
           po.status, po.created_by, po.created_at, po.updated_at
    FROM purchase_orders po
    JOIN inventories ri ON ri.id = po.requesting_inventory_id
    JOIN inventories fi ON fi.id = po.fulfilling_inventory_id
"#;

impl PurchaseOrderService {
    /// Create a new PurchaseOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a purchase order in status CREATED
    pub async fn create_po(
        &self,
        user_id: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        validate_distinct_inventories(input.requesting_inventory_id, input.fulfilling_inventory_id)?;
        validate_request_lines(&input.items)?;
        input.validate()?;

        master_data::inventory_kind(&self.db, input.requesting_inventory_id).await?;
        master_data::inventory_kind(&self.db, input.fulfilling_inventory_id).await?;
        let sku_ids: Vec<Uuid> = input.items.iter().map(|i| i.sku_id).collect();
        master_data::ensure_skus(&self.db, &sku_ids).await?;

        let route = PurchaseRoute {
            requesting_inventory_id: input.requesting_inventory_id,
            fulfilling_inventory_id: input.fulfilling_inventory_id,
        };

        let mut tx = self.db.begin().await?;
        let (po_id, po_number) = insert_purchase_order(
            &mut *tx,
            route,
            PurchaseOrderStatus::Created,
            &input.items,
            user_id,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            purchase_order_id = %po_id,
            po_number = %po_number,
            requesting_inventory_id = %route.requesting_inventory_id,
            fulfilling_inventory_id = %route.fulfilling_inventory_id,
            "Purchase order created"
        );

        self.get_po(po_id).await
    }

    /// List purchase orders, newest first
    pub async fn list_pos(
        &self,
        status: Option<PurchaseOrderStatus>,
    ) -> AppResult<Vec<PurchaseOrderDetail>> {
        let query = format!(
            "{} WHERE ($1::varchar IS NULL OR po.status = $1) ORDER BY po.created_at DESC",
            PURCHASE_ORDER_SELECT
        );
        let rows = sqlx::query_as::<_, PurchaseOrderRow>(&query)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;

        self.attach_details(rows).await
    }

    /// Get one purchase order
    pub async fn get_po(&self, po_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        let query = format!("{} WHERE po.id = $1", PURCHASE_ORDER_SELECT);
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&query)
            .bind(po_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let mut details = self.attach_details(vec![row]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))
    }

    async fn attach_details(&self, rows: Vec<PurchaseOrderRow>) -> AppResult<Vec<PurchaseOrderDetail>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let items = sqlx::query_as::<_, PurchaseOrderItemRow>(
            r#"
            SELECT poi.purchase_order_id, poi.sku_id, s.code AS sku_code, s.name AS sku_name,
                   poi.requested_quantity
            FROM purchase_order_items poi
            JOIN skus s ON s.id = poi.sku_id
            WHERE poi.purchase_order_id = ANY($1)
            ORDER BY s.code
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let transfers = sqlx::query_as::<_, TransferSummaryRow>(
            r#"
            SELECT id, purchase_order_id, to_number, status
            FROM transfer_orders
            WHERE purchase_order_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let items = items
                    .iter()
                    .filter(|i| i.purchase_order_id == row.id)
                    .map(|i| PurchaseOrderItemDetail {
                        sku: SkuRef {
                            id: i.sku_id,
                            code: i.sku_code.clone(),
                            name: i.sku_name.clone(),
                        },
                        requested_quantity: i.requested_quantity,
                    })
                    .collect();

                let transfer_orders = transfers
                    .iter()
                    .filter(|t| t.purchase_order_id == row.id)
                    .map(|t| {
                        Ok(TransferOrderSummary {
                            id: t.id,
                            to_number: t.to_number.clone(),
                            status: parse_transfer_status(&t.status)?,
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?;

                Ok(PurchaseOrderDetail {
                    id: row.id,
                    po_number: row.po_number,
                    requesting_inventory: InventoryRef {
                        id: row.requesting_inventory_id,
                        code: row.requesting_code,
                        name: row.requesting_name,
                    },
                    fulfilling_inventory: InventoryRef {
                        id: row.fulfilling_inventory_id,
                        code: row.fulfilling_code,
                        name: row.fulfilling_name,
                    },
                    status: parse_po_status(&row.status)?,
                    created_by: row.created_by,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                    items,
                    transfer_orders,
                })
            })
            .collect()
    }
}

/// Insert a PO and its items inside the caller's transaction
pub async fn insert_purchase_order(
    conn: &mut PgConnection,
    route: PurchaseRoute,
    status: PurchaseOrderStatus,
    items: &[RequestLine],
    user_id: Uuid,
) -> AppResult<(Uuid, String)> {
    let po_number = sequence::next_code(&mut *conn, DocumentKind::PurchaseOrder).await?;

    let po_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO purchase_orders (
            po_number, requesting_inventory_id, fulfilling_inventory_id, status, created_by
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&po_number)
    .bind(route.requesting_inventory_id)
    .bind(route.fulfilling_inventory_id)
    .bind(status.as_str())
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (purchase_order_id, sku_id, requested_quantity)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(po_id)
        .bind(item.sku_id)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok((po_id, po_number))
}

/// Lock a PO row for the rest of the transaction
pub async fn lock_purchase_order(conn: &mut PgConnection, po_id: Uuid) -> AppResult<LockedPurchaseOrder> {
    let (id, po_number, requesting, fulfilling, status) =
        sqlx::query_as::<_, (Uuid, String, Uuid, Uuid, String)>(
            r#"
            SELECT id, po_number, requesting_inventory_id, fulfilling_inventory_id, status
            FROM purchase_orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(po_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

    Ok(LockedPurchaseOrder {
        id,
        po_number,
        route: PurchaseRoute {
            requesting_inventory_id: requesting,
            fulfilling_inventory_id: fulfilling,
        },
        status: parse_po_status(&status)?,
    })
}

/// Persist a status the state rules produced
pub async fn update_status(
    conn: &mut PgConnection,
    po_id: Uuid,
    status: PurchaseOrderStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE purchase_orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(po_id)
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) fn parse_po_status(s: &str) -> AppResult<PurchaseOrderStatus> {
    PurchaseOrderStatus::from_str(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown purchase order status '{}'", s)))
}

pub(crate) fn parse_transfer_status(s: &str) -> AppResult<TransferOrderStatus> {
    TransferOrderStatus::from_str(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown transfer order status '{}'", s)))
}
