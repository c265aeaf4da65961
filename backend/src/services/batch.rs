//! Batch service: production lots and the stock they bring in

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    production_cells, production_reason, validate_request_lines, Batch, DocumentKind,
    InventoryKind, InventoryRef, RequestLine, SkuRef,
};

use crate::error::{AppError, AppResult};
use crate::services::{master_data, sequence, stock_ledger};

/// Batch service for production and batch lookups
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Input for producing a batch
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchInput {
    pub inventory_id: Uuid,
    /// Defaults to today (UTC)
    pub production_date: Option<NaiveDate>,
    #[validate(length(min = 1))]
    pub items: Vec<RequestLine>,
}

/// Batch with its producing inventory and produced items
#[derive(Debug, Clone, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub inventory: InventoryRef,
    pub items: Vec<BatchItemDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemDetail {
    pub sku: SkuRef,
    pub quantity: i32,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    code: String,
    inventory_id: Uuid,
    inventory_code: String,
    inventory_name: String,
    production_date: NaiveDate,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BatchItemRow {
    batch_id: Uuid,
    sku_id: Uuid,
    sku_code: String,
    sku_name: String,
    quantity: i32,
}

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Produce a batch: write the batch and its items, then credit every
    /// produced SKU at the producing inventory. One transaction.
    pub async fn create_batch(&self, user_id: Uuid, input: CreateBatchInput) -> AppResult<BatchDetail> {
        validate_request_lines(&input.items)?;
        input.validate()?;

        let kind = master_data::inventory_kind(&self.db, input.inventory_id).await?;
        if kind != InventoryKind::Production {
            return Err(AppError::Validation {
                field: "inventory_id".to_string(),
                message: format!(
                    "Batches can only be produced at a PRODUCTION inventory, not {}",
                    kind.as_str()
                ),
            });
        }

        let sku_ids: Vec<Uuid> = input.items.iter().map(|i| i.sku_id).collect();
        master_data::ensure_skus(&self.db, &sku_ids).await?;

        let production_date = input
            .production_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let code = sequence::next_code(&mut *tx, DocumentKind::Batch).await?;

        let batch_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO batches (code, inventory_id, production_date, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&code)
        .bind(input.inventory_id)
        .bind(production_date)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        for item in &input.items {
            sqlx::query(
                "INSERT INTO batch_items (batch_id, sku_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(batch_id)
            .bind(item.sku_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let reason = production_reason(&code);
        for (key, quantity) in production_cells(input.inventory_id, batch_id, &input.items) {
            stock_ledger::adjust(&mut *tx, key, quantity, user_id, &reason).await?;
        }

        tx.commit().await?;

        tracing::info!(
            batch_id = %batch_id,
            code = %code,
            inventory_id = %input.inventory_id,
            items = input.items.len(),
            "Production batch created"
        );

        self.get_batch(batch_id).await
    }

    /// List batches, optionally only those produced at one inventory
    pub async fn list_batches(&self, inventory_id: Option<Uuid>) -> AppResult<Vec<BatchDetail>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT b.id, b.code, b.inventory_id, i.code AS inventory_code,
                   i.name AS inventory_name, b.production_date, b.created_by, b.created_at
            FROM batches b
            JOIN inventories i ON i.id = b.inventory_id
            WHERE ($1::uuid IS NULL OR b.inventory_id = $1)
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(inventory_id)
        .fetch_all(&self.db)
        .await?;

        self.attach_items(rows).await
    }

    /// Get one batch with its items
    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<BatchDetail> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT b.id, b.code, b.inventory_id, i.code AS inventory_code,
                   i.name AS inventory_name, b.production_date, b.created_by, b.created_at
            FROM batches b
            JOIN inventories i ON i.id = b.inventory_id
            WHERE b.id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let mut details = self.attach_items(vec![row]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    async fn attach_items(&self, rows: Vec<BatchRow>) -> AppResult<Vec<BatchDetail>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let items = sqlx::query_as::<_, BatchItemRow>(
            r#"
            SELECT bi.batch_id, bi.sku_id, s.code AS sku_code, s.name AS sku_name, bi.quantity
            FROM batch_items bi
            JOIN skus s ON s.id = bi.sku_id
            WHERE bi.batch_id = ANY($1)
            ORDER BY s.code
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
                    .filter(|item| item.batch_id == row.id)
                    .map(|item| BatchItemDetail {
                        sku: SkuRef {
                            id: item.sku_id,
                            code: item.sku_code.clone(),
                            name: item.sku_name.clone(),
                        },
                        quantity: item.quantity,
                    })
                    .collect();

                BatchDetail {
                    batch: Batch {
                        id: row.id,
                        code: row.code,
                        inventory_id: row.inventory_id,
                        production_date: row.production_date,
                        created_by: row.created_by,
                        created_at: row.created_at,
                    },
                    inventory: InventoryRef {
                        id: row.inventory_id,
                        code: row.inventory_code,
                        name: row.inventory_name,
                    },
                    items,
                }
            })
            .collect())
    }
}
