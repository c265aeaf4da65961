//! Route definitions for the Stockflow API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .nest("/stock", stock_routes(state.clone()))
        .nest("/batches", batch_routes(state.clone()))
        .nest("/purchase-orders", purchase_order_routes(state.clone()))
        .nest("/transfer-orders", transfer_order_routes(state.clone()))
        .nest("/receive-orders", receive_order_routes(state))
}

/// Stock ledger routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock))
        .route("/cell", get(handlers::get_cell).put(handlers::edit_stock))
        .route("/history", get(handlers::list_history))
        .route("/audit", get(handlers::audit_ledger))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Batch routes (protected)
fn batch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Purchase order routes (protected)
fn purchase_order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route("/:po_id", get(handlers::get_purchase_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Transfer order routes (protected)
fn transfer_order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfer_orders))
        .route("/from-po", post(handlers::create_transfer_from_po))
        .route("/manual", post(handlers::create_manual_transfer))
        .route("/:to_id", get(handlers::get_transfer_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Receive order routes (protected)
fn receive_order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_receive_orders))
        .route("/from-to", post(handlers::create_receive_from_to))
        .route("/manual", post(handlers::create_manual_receive))
        .route("/:ro_id", get(handlers::get_receive_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
