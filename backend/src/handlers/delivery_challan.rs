//! HTTP handlers for delivery challans

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::{DeliveryChallan, ProductOrder};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::delivery_challan::{
    CreateDcInput, DcListQuery, DcPreview, DeliveryChallanService, UpdateDcInput,
};
use crate::AppState;

fn service(state: &AppState) -> DeliveryChallanService {
    DeliveryChallanService::new(state.db.clone(), state.events.clone())
}

/// List challans, optionally filtered by unit type and status
pub async fn list_delivery_challans(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<DcListQuery>,
) -> AppResult<Json<Vec<DeliveryChallan>>> {
    let challans = service(&state).list(query).await?;
    Ok(Json(challans))
}

pub async fn get_delivery_challan(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeliveryChallan>> {
    let challan = service(&state).get(id).await?;
    Ok(Json(challan))
}

/// Issue materials on a new challan
pub async fn create_delivery_challan(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateDcInput>,
) -> AppResult<(StatusCode, Json<DeliveryChallan>)> {
    let challan = service(&state).create(input).await?;
    tracing::debug!(dc_no = %challan.dc_no, user_id = %current_user.0.user_id, "DC issued");
    Ok((StatusCode::CREATED, Json(challan)))
}

/// Requirements and shortages for a prospective challan
pub async fn preview_delivery_challan(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(orders): Json<Vec<ProductOrder>>,
) -> AppResult<Json<DcPreview>> {
    let preview = service(&state).preview(orders).await?;
    Ok(Json(preview))
}

/// Status change and/or material usage update
pub async fn update_delivery_challan(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateDcInput>,
) -> AppResult<Json<DeliveryChallan>> {
    let challan = service(&state).update(id, &current_user.0, input).await?;
    Ok(Json(challan))
}
