use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::status::status_handler;
use crate::ws::{ws_handler, AppState};

/// Game WebSocket on `/`, status page on `/status`. Any origin may connect.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/status", get(status_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
