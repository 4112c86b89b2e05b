//! JSON API.

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod extract;
pub mod orders;
pub mod payments;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/cart", get(cart::show).post(cart::add_item).delete(cart::clear))
        .route("/cart/items/:item_id", patch(cart::update_item).delete(cart::remove_item))
        .route("/checkout", post(checkout::place_order))
        .route("/checkout/online", post(checkout::place_online_order))
        .route("/payments/confirm-payment", post(payments::confirm))
        .route("/payments/webhook", post(payments::webhook))
        .route("/orders", get(orders::index))
        .route("/orders/:id", get(orders::show).delete(orders::destroy))
        .route("/orders/:id/status", patch(orders::update_status));

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "healthy", "service": "marketplace" })) }))
        .nest("/api/v1", api)
        .fallback(error::route_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), error::expose_detail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `{"status": "success", "message"?, "data"}`
pub(crate) fn success(message: Option<&str>, data: Value) -> Json<Value> {
    let mut body = json!({ "status": "success" });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    body["data"] = data;
    Json(body)
}
