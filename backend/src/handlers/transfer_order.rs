//! HTTP handlers for transfer orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, Privilege};
use crate::services::transfer_order::{
    CreateManualTransferInput, CreateTransferFromPoInput, TransferOrderDetail,
    TransferOrderFilter, TransferOrderService,
};
use crate::AppState;

const FEATURE: &str = "transfer_order";

/// Dispatch stock against a purchase order
pub async fn create_transfer_from_po(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransferFromPoInput>,
) -> AppResult<(StatusCode, Json<TransferOrderDetail>)> {
    current_user.authorize(FEATURE, Privilege::Create)?;
    let service = TransferOrderService::new(state.db);
    let transfer = service.create_from_po(current_user.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// Dispatch stock without a purchase order
pub async fn create_manual_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateManualTransferInput>,
) -> AppResult<(StatusCode, Json<TransferOrderDetail>)> {
    current_user.authorize(FEATURE, Privilege::Create)?;
    let service = TransferOrderService::new(state.db);
    let transfer = service.create_manual(current_user.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn list_transfer_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TransferOrderFilter>,
) -> AppResult<Json<Vec<TransferOrderDetail>>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = TransferOrderService::new(state.db);
    let transfers = service.list_tos(filter).await?;
    Ok(Json(transfers))
}

pub async fn get_transfer_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(to_id): Path<Uuid>,
) -> AppResult<Json<TransferOrderDetail>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = TransferOrderService::new(state.db);
    let transfer = service.get_to(to_id).await?;
    Ok(Json(transfer))
}
