//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::PurchaseOrderStatus;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, Privilege};
use crate::services::purchase_order::{
    CreatePurchaseOrderInput, PurchaseOrderDetail, PurchaseOrderService,
};
use crate::AppState;

const FEATURE: &str = "purchase_order";

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
}

/// Create a purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrderDetail>)> {
    current_user.authorize(FEATURE, Privilege::Create)?;
    let service = PurchaseOrderService::new(state.db);
    let po = service.create_po(current_user.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(po)))
}

/// List purchase orders, optionally by status
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PurchaseOrderQuery>,
) -> AppResult<Json<Vec<PurchaseOrderDetail>>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = PurchaseOrderService::new(state.db);
    let pos = service.list_pos(query.status).await?;
    Ok(Json(pos))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = PurchaseOrderService::new(state.db);
    let po = service.get_po(po_id).await?;
    Ok(Json(po))
}
