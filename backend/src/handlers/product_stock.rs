//! HTTP handlers for finished-goods stock

use axum::{
    extract::{Path, State},
    Json,
};

use shared::{ProductStock, StockHistoryEntry};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::product_stock::{ProductStockService, UpdateThresholdInput};
use crate::AppState;

pub async fn list_product_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ProductStock>>> {
    let stocks = ProductStockService::new(state.db).list().await?;
    Ok(Json(stocks))
}

pub async fn get_product_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_name): Path<String>,
) -> AppResult<Json<ProductStock>> {
    let stock = ProductStockService::new(state.db).get(&product_name).await?;
    Ok(Json(stock))
}

pub async fn get_product_stock_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_name): Path<String>,
) -> AppResult<Json<Vec<StockHistoryEntry>>> {
    let history = ProductStockService::new(state.db).history(&product_name).await?;
    Ok(Json(history))
}

pub async fn update_product_threshold(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_name): Path<String>,
    Json(input): Json<UpdateThresholdInput>,
) -> AppResult<Json<ProductStock>> {
    let stock = ProductStockService::new(state.db)
        .update_threshold(&product_name, input)
        .await?;
    Ok(Json(stock))
}

/// Products below their alert threshold
pub async fn list_product_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ProductStock>>> {
    let alerts = ProductStockService::new(state.db).alerts().await?;
    Ok(Json(alerts))
}
