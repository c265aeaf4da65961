//! HTTP handlers for receive orders

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, Privilege};
use crate::services::receive_order::{
    CreateManualReceiveInput, CreateReceiveFromToInput, ReceiveOrderDetail, ReceiveOrderService,
};
use crate::AppState;

const FEATURE: &str = "receive_order";

/// Receive a transfer order
pub async fn create_receive_from_to(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReceiveFromToInput>,
) -> AppResult<(StatusCode, Json<ReceiveOrderDetail>)> {
    current_user.authorize(FEATURE, Privilege::Create)?;
    let service = ReceiveOrderService::new(state.db);
    let receipt = service.create_from_to(current_user.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Receive goods that arrived without a transfer order
pub async fn create_manual_receive(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateManualReceiveInput>,
) -> AppResult<(StatusCode, Json<ReceiveOrderDetail>)> {
    current_user.authorize(FEATURE, Privilege::Create)?;
    let service = ReceiveOrderService::new(state.db);
    let receipt = service.create_manual(current_user.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_receive_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ReceiveOrderDetail>>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = ReceiveOrderService::new(state.db);
    let receipts = service.list_ros().await?;
    Ok(Json(receipts))
}

pub async fn get_receive_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(ro_id): Path<Uuid>,
) -> AppResult<Json<ReceiveOrderDetail>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = ReceiveOrderService::new(state.db);
    let receipt = service.get_ro(ro_id).await?;
    Ok(Json(receipt))
}
