//! HTTP handlers for the packing and raw material catalogs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{Material, MaterialKind, PriceHistoryEntry};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::material::{
    AddStockInput, AlertQuery, CreateMaterialInput, MaterialService, UpdateMaterialInput,
};
use crate::AppState;

fn service(state: &AppState) -> MaterialService {
    MaterialService::new(state.db.clone(), state.events.clone())
}

/// List materials of one kind
pub async fn list_materials(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(kind): Path<MaterialKind>,
) -> AppResult<Json<Vec<Material>>> {
    let materials = service(&state).list(kind).await?;
    Ok(Json(materials))
}

pub async fn get_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((kind, id)): Path<(MaterialKind, Uuid)>,
) -> AppResult<Json<Material>> {
    let material = service(&state).get(kind, id).await?;
    Ok(Json(material))
}

/// Create a material with its opening stock
pub async fn create_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(kind): Path<MaterialKind>,
    Json(input): Json<CreateMaterialInput>,
) -> AppResult<(StatusCode, Json<Material>)> {
    let material = service(&state).create(kind, input).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn update_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((kind, id)): Path<(MaterialKind, Uuid)>,
    Json(input): Json<UpdateMaterialInput>,
) -> AppResult<Json<Material>> {
    let material = service(&state).update(kind, id, input).await?;
    Ok(Json(material))
}

pub async fn delete_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((kind, id)): Path<(MaterialKind, Uuid)>,
) -> AppResult<StatusCode> {
    service(&state).delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Receive stock outside a purchase order
pub async fn add_material_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((kind, id)): Path<(MaterialKind, Uuid)>,
    Json(input): Json<AddStockInput>,
) -> AppResult<Json<Material>> {
    let material = service(&state).add_stock(kind, id, input).await?;
    Ok(Json(material))
}

/// Price history, newest first
pub async fn get_material_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path((kind, id)): Path<(MaterialKind, Uuid)>,
) -> AppResult<Json<Vec<PriceHistoryEntry>>> {
    let history = service(&state).history(kind, id).await?;
    Ok(Json(history))
}

/// Materials below their alert threshold
pub async fn list_material_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<AlertQuery>,
) -> AppResult<Json<Vec<Material>>> {
    let alerts = service(&state).alerts(query.kind).await?;
    Ok(Json(alerts))
}
