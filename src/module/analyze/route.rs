use super::controller;
use crate::app::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn register_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/analyze", post(controller::analyze))
        .route("/v1/health", get(controller::health))
        .with_state(state)
}
