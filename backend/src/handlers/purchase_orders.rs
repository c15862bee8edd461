//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{PurchaseOrder, WeeklyStat};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase_order::{
    CreatePoInput, PoListQuery, PoStatusInput, PurchaseOrderService, UpdatePoInput,
};
use crate::AppState;

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<PoListQuery>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let orders = PurchaseOrderService::new(state.db).list(query).await?;
    Ok(Json(orders))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = PurchaseOrderService::new(state.db).get(id).await?;
    Ok(Json(order))
}

pub async fn create_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreatePoInput>,
) -> AppResult<(StatusCode, Json<PurchaseOrder>)> {
    let order = PurchaseOrderService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePoInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = PurchaseOrderService::new(state.db).update(id, input).await?;
    Ok(Json(order))
}

/// Approve, cancel, re-order, or complete
pub async fn update_purchase_order_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<PoStatusInput>,
) -> AppResult<Json<PurchaseOrder>> {
    let order = PurchaseOrderService::new(state.db)
        .update_status(id, &current_user.0, input)
        .await?;
    Ok(Json(order))
}

pub async fn delete_purchase_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    PurchaseOrderService::new(state.db).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Orders per day over the last week
pub async fn get_weekly_stats(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<WeeklyStat>>> {
    let stats = PurchaseOrderService::new(state.db).weekly_stats().await?;
    Ok(Json(stats))
}
