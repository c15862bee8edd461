//! HTTP handlers for reconciliation batches

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::ReconciliationBatch;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reconciliation::{
    BatchListQuery, CreateBatchInput, ReconciliationService, UpdateBatchInput,
};
use crate::AppState;

pub async fn list_reconciliations(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<BatchListQuery>,
) -> AppResult<Json<Vec<ReconciliationBatch>>> {
    let batches = ReconciliationService::new(state.db).list(query).await?;
    Ok(Json(batches))
}

pub async fn get_reconciliation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReconciliationBatch>> {
    let batch = ReconciliationService::new(state.db).get(id).await?;
    Ok(Json(batch))
}

pub async fn create_reconciliation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<ReconciliationBatch>)> {
    let batch = ReconciliationService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn update_reconciliation(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBatchInput>,
) -> AppResult<Json<ReconciliationBatch>> {
    let batch = ReconciliationService::new(state.db).update(id, input).await?;
    Ok(Json(batch))
}
