//! HTTP handlers for stock levels, manual edits, history and audits

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{CellKey, LedgerAudit, SkuStock};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, Privilege};
use crate::services::stock_ledger::{
    CellQuantity, EditStockInput, HistoryFilter, StockHistoryEntry, StockLedgerService,
};
use crate::AppState;

const FEATURE: &str = "stock";

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    pub inventory_id: Uuid,
    pub sku_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CellQuery {
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub batch_id: Uuid,
}

/// Stock at an inventory grouped by SKU
pub async fn list_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<StockQuery>,
) -> AppResult<Json<Vec<SkuStock>>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = StockLedgerService::new(state.db);
    let stock = service.list_by_sku(query.inventory_id, query.sku_id).await?;
    Ok(Json(stock))
}

/// Quantity of a single cell
pub async fn get_cell(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CellQuery>,
) -> AppResult<Json<CellQuantity>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = StockLedgerService::new(state.db);
    let cell = service
        .get_cell(CellKey::new(query.inventory_id, query.sku_id, query.batch_id))
        .await?;
    Ok(Json(cell))
}

/// Overwrite a cell with a counted quantity
pub async fn edit_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<EditStockInput>,
) -> AppResult<Json<StockHistoryEntry>> {
    current_user.authorize(FEATURE, Privilege::Edit)?;
    let service = StockLedgerService::new(state.db);
    let entry = service.edit_stock(current_user.user_id(), input).await?;
    Ok(Json(entry))
}

/// Stock history, newest first
pub async fn list_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<Json<Vec<StockHistoryEntry>>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = StockLedgerService::new(state.db);
    let history = service.list_history(filter).await?;
    Ok(Json(history))
}

/// Replay the ledger and report inconsistencies
pub async fn audit_ledger(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<LedgerAudit>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = StockLedgerService::new(state.db);
    let audit = service.audit().await?;
    Ok(Json(audit))
}
