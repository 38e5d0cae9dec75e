use super::controller;
use crate::app::AppState;
use axum::routing::get;
use axum::Router;

pub fn register_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/policies",
            get(controller::list_policies).post(controller::create_policy),
        )
        .route("/v1/policies/:policy_id", get(controller::get_policy))
        .with_state(state)
}
