//! HTTP handlers for damage write-offs and material requests

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{DamagedStock, MaterialRequest};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::approval::{
    CreateRequestInput, DamagedStockService, DecisionInput, MaterialRequestService,
    ReportDamageInput,
};
use crate::AppState;

pub async fn list_damaged_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<DamagedStock>>> {
    let records = DamagedStockService::new(state.db, state.events).list().await?;
    Ok(Json(records))
}

pub async fn report_damaged_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReportDamageInput>,
) -> AppResult<(StatusCode, Json<DamagedStock>)> {
    let record = DamagedStockService::new(state.db, state.events)
        .report(&current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Admin decision; approval writes the stock off
pub async fn decide_damaged_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<DamagedStock>> {
    let record = DamagedStockService::new(state.db, state.events)
        .decide(id, &current_user.0, input)
        .await?;
    Ok(Json(record))
}

pub async fn list_material_requests(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<MaterialRequest>>> {
    let requests = MaterialRequestService::new(state.db, state.events).list().await?;
    Ok(Json(requests))
}

pub async fn create_material_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRequestInput>,
) -> AppResult<(StatusCode, Json<MaterialRequest>)> {
    let request = MaterialRequestService::new(state.db, state.events)
        .create(&current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Admin decision; approval issues the material
pub async fn decide_material_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<MaterialRequest>> {
    let request = MaterialRequestService::new(state.db, state.events)
        .decide(id, &current_user.0, input)
        .await?;
    Ok(Json(request))
}
