//! Stock ledger: per-(inventory, SKU, batch) quantities and their audit trail
//!
//! [`adjust`] and [`set_absolute`] are the only code paths that change a
//! quantity. Both run inside the caller's transaction, lock the cell row
//! before reading it, and append exactly one history row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    audit_ledger, group_by_sku, validate_absolute_quantity, validate_reason, CellKey, LedgerAudit,
    LedgerEntry, Shortage, SkuStock, StockChange, StockError, StockLevel,
};

use crate::error::{AppError, AppResult};
use crate::services::master_data;

/// Stock ledger service for reads, manual edits and audits
#[derive(Clone)]
pub struct StockLedgerService {
    db: PgPool,
}

/// Immutable record of one cell mutation
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockHistoryEntry {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub batch_id: Uuid,
    pub user_id: Uuid,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl StockHistoryEntry {
    fn key(&self) -> CellKey {
        CellKey::new(self.inventory_id, self.sku_id, self.batch_id)
    }
}

/// Quantity of a single cell
#[derive(Debug, Clone, Serialize)]
pub struct CellQuantity {
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub batch_id: Uuid,
    pub quantity: i32,
}

/// Filter for the history listing
#[derive(Debug, Default, Deserialize)]
pub struct HistoryFilter {
    pub inventory_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Input for overwriting one cell
#[derive(Debug, Deserialize, Validate)]
pub struct EditStockInput {
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub batch_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}

#[derive(Debug, FromRow)]
struct StockLevelRow {
    sku_id: Uuid,
    sku_code: String,
    sku_name: String,
    batch_id: Uuid,
    batch_code: String,
    quantity: i32,
}

const DEFAULT_HISTORY_LIMIT: i64 = 500;

impl StockLedgerService {
    /// Create a new StockLedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Quantity of one cell, 0 if it was never stocked
    pub async fn get_cell(&self, key: CellKey) -> AppResult<CellQuantity> {
        let quantity = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT quantity FROM stock_cells
            WHERE inventory_id = $1 AND sku_id = $2 AND batch_id = $3
            "#,
        )
        .bind(key.inventory_id)
        .bind(key.sku_id)
        .bind(key.batch_id)
        .fetch_optional(&self.db)
        .await?
        .unwrap_or(0);

        Ok(CellQuantity {
            inventory_id: key.inventory_id,
            sku_id: key.sku_id,
            batch_id: key.batch_id,
            quantity,
        })
    }

    /// Stock at an inventory grouped per SKU, empty cells left out
    pub async fn list_by_sku(&self, inventory_id: Uuid, sku_id: Option<Uuid>) -> AppResult<Vec<SkuStock>> {
        master_data::inventory_kind(&self.db, inventory_id).await?;

        let rows = sqlx::query_as::<_, StockLevelRow>(
            r#"
            SELECT sc.sku_id, s.code AS sku_code, s.name AS sku_name,
                   sc.batch_id, b.code AS batch_code, sc.quantity
            FROM stock_cells sc
            JOIN skus s ON s.id = sc.sku_id
            JOIN batches b ON b.id = sc.batch_id
            WHERE sc.inventory_id = $1
              AND ($2::uuid IS NULL OR sc.sku_id = $2)
              AND sc.quantity > 0
            ORDER BY s.code, b.code
            "#,
        )
        .bind(inventory_id)
        .bind(sku_id)
        .fetch_all(&self.db)
        .await?;

        let levels = rows
            .into_iter()
            .map(|r| StockLevel {
                sku_id: r.sku_id,
                sku_code: r.sku_code,
                sku_name: r.sku_name,
                batch_id: r.batch_id,
                batch_code: r.batch_code,
                quantity: r.quantity,
            })
            .collect();

        Ok(group_by_sku(levels))
    }

    /// History rows, newest first
    pub async fn list_history(&self, filter: HistoryFilter) -> AppResult<Vec<StockHistoryEntry>> {
        let limit = filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 5000);

        let entries = sqlx::query_as::<_, StockHistoryEntry>(
            r#"
            SELECT id, inventory_id, sku_id, batch_id, user_id, old_quantity, new_quantity,
                   reason, created_at
            FROM stock_history
            WHERE ($1::uuid IS NULL OR inventory_id = $1)
              AND ($2::uuid IS NULL OR sku_id = $2)
              AND ($3::uuid IS NULL OR batch_id = $3)
            ORDER BY seq DESC
            LIMIT $4
            "#,
        )
        .bind(filter.inventory_id)
        .bind(filter.sku_id)
        .bind(filter.batch_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Overwrite one cell with an absolute quantity. The reason is stored
    /// verbatim so manual edits stay distinguishable from order activity.
    pub async fn edit_stock(&self, user_id: Uuid, input: EditStockInput) -> AppResult<StockHistoryEntry> {
        validate_reason(&input.reason)?;
        validate_absolute_quantity(input.quantity)?;
        input.validate()?;

        master_data::inventory_kind(&self.db, input.inventory_id).await?;
        master_data::ensure_skus(&self.db, &[input.sku_id]).await?;
        master_data::ensure_batches(&self.db, &[input.batch_id]).await?;

        let key = CellKey::new(input.inventory_id, input.sku_id, input.batch_id);

        let mut tx = self.db.begin().await?;
        let entry = set_absolute(&mut *tx, key, input.quantity, user_id, &input.reason).await?;
        tx.commit().await?;

        tracing::info!(
            inventory_id = %key.inventory_id,
            sku_id = %key.sku_id,
            batch_id = %key.batch_id,
            old_quantity = entry.old_quantity,
            new_quantity = entry.new_quantity,
            "Stock edited manually"
        );

        Ok(entry)
    }

    /// Replay the whole history from zero and compare with stored cells
    pub async fn audit(&self) -> AppResult<LedgerAudit> {
        let history = sqlx::query_as::<_, StockHistoryEntry>(
            r#"
            SELECT id, inventory_id, sku_id, batch_id, user_id, old_quantity, new_quantity,
                   reason, created_at
            FROM stock_history
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let cells = sqlx::query_as::<_, (Uuid, Uuid, Uuid, i32)>(
            "SELECT inventory_id, sku_id, batch_id, quantity FROM stock_cells",
        )
        .fetch_all(&self.db)
        .await?;

        let entries: Vec<LedgerEntry> = history
            .into_iter()
            .map(|h| LedgerEntry {
                key: h.key(),
                old_quantity: h.old_quantity,
                new_quantity: h.new_quantity,
                reason: h.reason,
            })
            .collect();

        let audit = audit_ledger(
            &entries,
            cells
                .into_iter()
                .map(|(inv, sku, batch, qty)| (CellKey::new(inv, sku, batch), qty)),
        );

        if !audit.is_clean() {
            tracing::warn!(
                chain_breaks = audit.chain_breaks.len(),
                mismatched_cells = audit.mismatched_cells.len(),
                "Stock ledger audit found discrepancies"
            );
        }

        Ok(audit)
    }
}

/// Make sure the cell row exists and lock it for the rest of the transaction.
/// Returns the current quantity.
pub async fn lock_cell(conn: &mut PgConnection, key: CellKey) -> AppResult<i32> {
    sqlx::query(
        r#"
        INSERT INTO stock_cells (inventory_id, sku_id, batch_id, quantity)
        VALUES ($1, $2, $3, 0)
        ON CONFLICT (inventory_id, sku_id, batch_id) DO NOTHING
        "#,
    )
    .bind(key.inventory_id)
    .bind(key.sku_id)
    .bind(key.batch_id)
    .execute(&mut *conn)
    .await?;

    let quantity = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT quantity FROM stock_cells
        WHERE inventory_id = $1 AND sku_id = $2 AND batch_id = $3
        FOR UPDATE
        "#,
    )
    .bind(key.inventory_id)
    .bind(key.sku_id)
    .bind(key.batch_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(quantity)
}

/// Add `delta` to a cell. Fails with `InsufficientStock` if the result would
/// be negative; the caller's transaction must then be abandoned.
pub async fn adjust(
    conn: &mut PgConnection,
    key: CellKey,
    delta: i32,
    user_id: Uuid,
    reason: &str,
) -> AppResult<StockHistoryEntry> {
    apply_change(conn, key, StockChange::Delta(delta), user_id, reason).await
}

/// Set a cell to an absolute, non-negative quantity
pub async fn set_absolute(
    conn: &mut PgConnection,
    key: CellKey,
    quantity: i32,
    user_id: Uuid,
    reason: &str,
) -> AppResult<StockHistoryEntry> {
    apply_change(conn, key, StockChange::Absolute(quantity), user_id, reason).await
}

/// Apply a planned change to one cell and record it
pub async fn apply_change(
    conn: &mut PgConnection,
    key: CellKey,
    change: StockChange,
    user_id: Uuid,
    reason: &str,
) -> AppResult<StockHistoryEntry> {
    let old_quantity = lock_cell(conn, key).await?;

    let new_quantity = change.apply(old_quantity).map_err(|err| match err {
        StockError::Insufficient {
            available,
            requested,
        } => {
            tracing::warn!(
                inventory_id = %key.inventory_id,
                sku_id = %key.sku_id,
                batch_id = %key.batch_id,
                available,
                requested,
                "Insufficient stock"
            );
            AppError::InsufficientStock(vec![Shortage {
                inventory_id: key.inventory_id,
                sku_id: key.sku_id,
                batch_id: key.batch_id,
                requested,
                available,
            }])
        }
        other => other.into(),
    })?;

    sqlx::query(
        r#"
        UPDATE stock_cells
        SET quantity = $4, updated_at = NOW()
        WHERE inventory_id = $1 AND sku_id = $2 AND batch_id = $3
        "#,
    )
    .bind(key.inventory_id)
    .bind(key.sku_id)
    .bind(key.batch_id)
    .bind(new_quantity)
    .execute(&mut *conn)
    .await?;

    let entry = sqlx::query_as::<_, StockHistoryEntry>(
        r#"
        INSERT INTO stock_history (
            inventory_id, sku_id, batch_id, user_id, old_quantity, new_quantity, reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, inventory_id, sku_id, batch_id, user_id, old_quantity, new_quantity,
                  reason, created_at
        "#,
    )
    .bind(key.inventory_id)
    .bind(key.sku_id)
    .bind(key.batch_id)
    .bind(user_id)
    .bind(old_quantity)
    .bind(new_quantity)
    .bind(reason)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}
