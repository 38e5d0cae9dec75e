use super::crud;
use super::schema::{
    CreatePolicyRequest, CreatePolicyResponse, GetPolicyResponse, ListPoliciesResponse,
};
use crate::app::AppState;
use crate::module::error::AppError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{error, info, warn};
use uuid::Uuid;

pub async fn create_policy(
    State(state): State<AppState>,
    Json(req): Json<CreatePolicyRequest>,
) -> impl IntoResponse {
    if let Err(err) = crud::validate_create_request(&req) {
        return error_create(err);
    }
    let Some(infra) = &state.infra else {
        return error_create(AppError::service_unavailable(
            "STORE_UNAVAILABLE",
            "durable store is not configured",
        ));
    };

    match crud::create(&infra.pg, req).await {
        Ok(policy) => {
            // Narrow the staleness window so the new policy applies to the
            // next request instead of waiting for the refresh tick.
            if let Err(e) = state.cache.invalidate().await {
                warn!(error = %e, "policy cache invalidate failed after create");
            }
            info!(
                policy_id = %policy.id,
                name = %policy.name,
                pattern_type = policy.pattern_type.as_str(),
                severity = policy.severity.as_str(),
                action = policy.action.as_str(),
                "policy created"
            );
            (
                StatusCode::CREATED,
                Json(CreatePolicyResponse {
                    created: true,
                    policy: Some(policy),
                    error_code: None,
                    reason: "policy created".to_string(),
                }),
            )
        }
        Err(err) => error_create(err),
    }
}

pub async fn list_policies(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache.get();
    (
        StatusCode::OK,
        Json(ListPoliciesResponse {
            count: snapshot.policies.len(),
            policies: snapshot.policies.clone(),
        }),
    )
}

pub async fn get_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&policy_id) {
        Ok(id) => id,
        Err(e) => {
            return error_get(AppError::bad_request(
                "INVALID_POLICY_ID",
                format!("invalid policy id: {e}"),
            ))
        }
    };

    let snapshot = state.cache.get();
    if let Some(policy) = snapshot.policies.iter().find(|p| p.id == id) {
        return (
            StatusCode::OK,
            Json(GetPolicyResponse {
                found: true,
                policy: Some(policy.clone()),
                error_code: None,
                reason: "policy found".to_string(),
            }),
        );
    }

    let Some(infra) = &state.infra else {
        return error_get(AppError::not_found("POLICY_NOT_FOUND", "policy not found"));
    };
    match crud::get(&infra.pg, id).await {
        Ok(policy) => (
            StatusCode::OK,
            Json(GetPolicyResponse {
                found: true,
                policy: Some(policy),
                error_code: None,
                reason: "policy found".to_string(),
            }),
        ),
        Err(err) => error_get(err),
    }
}

fn error_create(err: AppError) -> (StatusCode, Json<CreatePolicyResponse>) {
    error!(error_code = err.code, reason = %err.message, "policy rejected");
    (
        err.status,
        Json(CreatePolicyResponse {
            created: false,
            policy: None,
            error_code: Some(err.code.to_string()),
            reason: err.message,
        }),
    )
}

fn error_get(err: AppError) -> (StatusCode, Json<GetPolicyResponse>) {
    error!(error_code = err.code, reason = %err.message, "policy lookup failed");
    (
        err.status,
        Json(GetPolicyResponse {
            found: false,
            policy: None,
            error_code: Some(err.code.to_string()),
            reason: err.message,
        }),
    )
}
