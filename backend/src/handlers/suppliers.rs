//! HTTP handlers for the supplier registry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use shared::{CreateSupplierInput, MaterialType, Supplier, UpdateSupplierInput};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::supplier::SupplierService;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSupplierCode {
    pub supplier_code: String,
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Supplier>>> {
    let suppliers = SupplierService::new(state.db).list().await?;
    Ok(Json(suppliers))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    let supplier = SupplierService::new(state.db).get(id).await?;
    Ok(Json(supplier))
}

/// Jobbers that handle the given material type
pub async fn list_jobbers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_type): Path<MaterialType>,
) -> AppResult<Json<Vec<Supplier>>> {
    let jobbers = SupplierService::new(state.db).list_jobbers(material_type).await?;
    Ok(Json(jobbers))
}

/// Preview of the next code; does not consume it
pub async fn get_next_supplier_code(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<NextSupplierCode>> {
    let supplier_code = SupplierService::new(state.db).next_supplier_code().await?;
    Ok(Json(NextSupplierCode { supplier_code }))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let supplier = SupplierService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    let supplier = SupplierService::new(state.db).update(id, input).await?;
    Ok(Json(supplier))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    SupplierService::new(state.db).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
