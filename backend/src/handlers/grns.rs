//! HTTP handlers for goods receipt notes

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::Grn;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::grn::{GrnService, ReceiveInput};
use crate::AppState;

fn service(state: &AppState) -> GrnService {
    GrnService::new(state.db.clone(), state.events.clone())
}

pub async fn list_grns(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Grn>>> {
    let grns = service(&state).list().await?;
    Ok(Json(grns))
}

pub async fn get_grn(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Grn>> {
    let grn = service(&state).get(id).await?;
    Ok(Json(grn))
}

pub async fn get_grn_for_po(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(po_id): Path<Uuid>,
) -> AppResult<Json<Grn>> {
    let grn = service(&state).get_by_po(po_id).await?;
    Ok(Json(grn))
}

/// Record a receipt against a purchase order
pub async fn receive_goods(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReceiveInput>,
) -> AppResult<Json<Grn>> {
    let grn = service(&state).receive(input).await?;
    tracing::debug!(grn_number = %grn.grn_number, user_id = %current_user.0.user_id, "Receipt recorded");
    Ok(Json(grn))
}
