//! Lookups against master data (inventories, SKUs, employees, batches)
//!
//! These tables are maintained elsewhere; here they are only checked for
//! existence before a document is written.

use shared::InventoryKind;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Fetch an inventory's kind, or `NotFound`
pub async fn inventory_kind<'e, E>(executor: E, inventory_id: Uuid) -> AppResult<InventoryKind>
where
    E: Executor<'e, Database = Postgres>,
{
    let kind: String = sqlx::query_scalar("SELECT kind FROM inventories WHERE id = $1")
        .bind(inventory_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Inventory {}", inventory_id)))?;

    InventoryKind::from_str(&kind)
        .ok_or_else(|| AppError::Internal(format!("Unknown inventory kind '{}'", kind)))
}

/// Fail with `NotFound` naming the first missing SKU
pub async fn ensure_skus<'e, E>(executor: E, sku_ids: &[Uuid]) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM skus WHERE id = ANY($1)")
        .bind(sku_ids)
        .fetch_all(executor)
        .await?;

    match sku_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::NotFound(format!("SKU {}", missing))),
        None => Ok(()),
    }
}

/// Fail with `NotFound` naming the first missing batch
pub async fn ensure_batches<'e, E>(executor: E, batch_ids: &[Uuid]) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM batches WHERE id = ANY($1)")
        .bind(batch_ids)
        .fetch_all(executor)
        .await?;

    match batch_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::NotFound(format!("Batch {}", missing))),
        None => Ok(()),
    }
}

pub async fn ensure_employee<'e, E>(executor: E, employee_id: Uuid) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM employees WHERE id = $1)")
        .bind(employee_id)
        .fetch_one(executor)
        .await?;

    if !exists {
        return Err(AppError::NotFound(format!("Employee {}", employee_id)));
    }
    Ok(())
}
