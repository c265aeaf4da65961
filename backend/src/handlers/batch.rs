//! HTTP handlers for production batches

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, Privilege};
use crate::services::batch::{BatchDetail, BatchService, CreateBatchInput};
use crate::AppState;

const FEATURE: &str = "batch";

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub inventory_id: Option<Uuid>,
}

/// Produce a batch and credit its stock
pub async fn create_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<BatchDetail>)> {
    current_user.authorize(FEATURE, Privilege::Create)?;
    let service = BatchService::new(state.db);
    let batch = service.create_batch(current_user.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn list_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<BatchQuery>,
) -> AppResult<Json<Vec<BatchDetail>>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = BatchService::new(state.db);
    let batches = service.list_batches(query.inventory_id).await?;
    Ok(Json(batches))
}

pub async fn get_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchDetail>> {
    current_user.authorize(FEATURE, Privilege::View)?;
    let service = BatchService::new(state.db);
    let batch = service.get_batch(batch_id).await?;
    Ok(Json(batch))
}
