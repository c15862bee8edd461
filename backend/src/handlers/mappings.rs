//! HTTP handlers for product-material recipes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use shared::ProductMaterialMapping;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::mapping::MappingService;
use crate::AppState;

pub async fn list_mappings(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ProductMaterialMapping>>> {
    let mappings = MappingService::new(state.db).list().await?;
    Ok(Json(mappings))
}

pub async fn get_mapping(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_name): Path<String>,
) -> AppResult<Json<ProductMaterialMapping>> {
    let mapping = MappingService::new(state.db).get(&product_name).await?;
    Ok(Json(mapping))
}

/// Create or replace a product's recipe
pub async fn upsert_mapping(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<ProductMaterialMapping>,
) -> AppResult<Json<ProductMaterialMapping>> {
    let mapping = MappingService::new(state.db).upsert(input).await?;
    Ok(Json(mapping))
}

pub async fn delete_mapping(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_name): Path<String>,
) -> AppResult<StatusCode> {
    MappingService::new(state.db).delete(&product_name).await?;
    Ok(StatusCode::NO_CONTENT)
}
