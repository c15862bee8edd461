//! Route definitions for the Millstock back office

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{events::stream_events, handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/delivery-challan", delivery_challan_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/materials", material_routes())
        .nest("/mappings", mapping_routes())
        .nest("/product-stock", product_stock_routes())
        .nest("/grns", grn_routes())
        .nest("/reconciliations", reconciliation_routes())
        .nest("/damaged-stock", damaged_stock_routes())
        .nest("/material-requests", material_request_routes())
        // Dashboard live refresh
        .route("/events", get(stream_events))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Delivery challan routes
fn delivery_challan_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_delivery_challans).post(handlers::create_delivery_challan),
        )
        .route("/preview", post(handlers::preview_delivery_challan))
        .route(
            "/:dc_id",
            get(handlers::get_delivery_challan).put(handlers::update_delivery_challan),
        )
}

/// Purchase order routes
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route("/weekly-stats", get(handlers::get_weekly_stats))
        .route(
            "/:po_id",
            get(handlers::get_purchase_order)
                .put(handlers::update_purchase_order)
                .delete(handlers::delete_purchase_order),
        )
        .route("/:po_id/status", put(handlers::update_purchase_order_status))
        .route("/:po_id/grn", get(handlers::get_grn_for_po))
}

/// Supplier registry routes
fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route("/next-supplier-code", get(handlers::get_next_supplier_code))
        .route("/jobber/:material_type", get(handlers::list_jobbers))
        .route(
            "/:supplier_id",
            get(handlers::get_supplier)
                .put(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
}

/// Packing and raw material catalogs
fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(handlers::list_material_alerts))
        .route(
            "/:kind",
            get(handlers::list_materials).post(handlers::create_material),
        )
        .route(
            "/:kind/:material_id",
            get(handlers::get_material)
                .put(handlers::update_material)
                .delete(handlers::delete_material),
        )
        .route("/:kind/:material_id/stock", post(handlers::add_material_stock))
        .route("/:kind/:material_id/history", get(handlers::get_material_history))
}

/// Product to material recipes
fn mapping_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_mappings).post(handlers::upsert_mapping))
        .route(
            "/:product_name",
            get(handlers::get_mapping).delete(handlers::delete_mapping),
        )
}

/// Finished goods stock
fn product_stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_product_stock))
        .route("/alerts", get(handlers::list_product_alerts))
        .route("/:product_name", get(handlers::get_product_stock))
        .route("/:product_name/history", get(handlers::get_product_stock_history))
        .route("/:product_name/threshold", put(handlers::update_product_threshold))
}

/// Goods receipt notes
fn grn_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_grns).post(handlers::receive_goods))
        .route("/:grn_id", get(handlers::get_grn))
}

/// Reconciliation batches
fn reconciliation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_reconciliations).post(handlers::create_reconciliation),
        )
        .route(
            "/:batch_id",
            get(handlers::get_reconciliation).put(handlers::update_reconciliation),
        )
}

/// Damage write-offs
fn damaged_stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_damaged_stock).post(handlers::report_damaged_stock),
        )
        .route("/:record_id/decision", post(handlers::decide_damaged_stock))
}

/// Material issue requests
fn material_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_material_requests).post(handlers::create_material_request),
        )
        .route("/:request_id/decision", post(handlers::decide_material_request))
}
