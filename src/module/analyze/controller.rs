use super::model::AuditLogRecord;
use super::schema::{
    AnalyzeRequest, AnalyzeResponse, HealthMetricsView, HealthResponse, PolicyMatch,
    QueueStatsView,
};
use crate::app::AppState;
use crate::module::error::AppError;
use crate::module::policy::model::{PolicyAction, Severity};
use crate::service::audit_sync_service;
use crate::service::hash_service::sha256_hex;
use crate::service::metrics_service;
use crate::service::policy_cache_service::PolicySnapshot;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Verdict {
    pub action: &'static str,
    pub allowed: bool,
    pub highest_severity: Option<Severity>,
}

/// A single blocking policy decides the verdict; severity is telemetry only.
pub fn reduce_verdict(matches: &[PolicyMatch], snapshot: &PolicySnapshot) -> Verdict {
    let mut action = "allow";
    let mut allowed = true;
    let mut highest: Option<Severity> = None;

    for m in matches {
        let Some(policy) = snapshot.policies.iter().find(|p| p.id == m.policy_id) else {
            continue;
        };
        if policy.action == PolicyAction::Block {
            action = "block";
            allowed = false;
        }
        highest = Some(highest.map_or(m.severity, |h| h.max(m.severity)));
    }

    Verdict {
        action,
        allowed,
        highest_severity: highest,
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = Uuid::new_v4();

    if req.client_id.trim().is_empty() {
        return error_analyze(
            AppError::bad_request("MISSING_CLIENT_ID", "client_id is required"),
            request_id,
            &started,
        );
    }
    if req.prompt.is_empty() {
        return error_analyze(
            AppError::bad_request("MISSING_PROMPT", "prompt is required"),
            request_id,
            &started,
        );
    }

    let snapshot = state.cache.get();
    let content = if req.response.is_empty() {
        req.prompt.clone()
    } else {
        format!("{}\n{}", req.prompt, req.response)
    };

    let deadline = Duration::from_secs(state.config.request_timeout_seconds.max(1));
    let matches = match tokio::time::timeout(deadline, state.analyzer.analyze(&content, &snapshot))
        .await
    {
        Err(_) => {
            // The verdict was never produced, so the caller gets a 504 and the
            // trail records the request as blocked.
            warn!(request_id = %request_id, "analysis deadline exceeded");
            let record = audit_record(request_id, &req, &[], "block", &started);
            state.audit.log(record).await;
            return error_analyze(
                AppError::gateway_timeout("REQUEST_TIMEOUT", "analysis deadline exceeded"),
                request_id,
                &started,
            );
        }
        Ok(Err(e)) => {
            error!(request_id = %request_id, error = %e, "analysis failed");
            return error_analyze(
                AppError::internal("ANALYSIS_FAILED", e),
                request_id,
                &started,
            );
        }
        Ok(Ok(matches)) => matches,
    };

    for m in &matches {
        metrics_service::inc_policy_match(m.severity);
    }

    let verdict = reduce_verdict(&matches, &snapshot);
    let redacted_prompt = if matches.is_empty() {
        String::new()
    } else {
        state.analyzer.redact(&req.prompt, &matches, &snapshot)
    };

    let record = audit_record(request_id, &req, &matches, verdict.action, &started);
    let latency_ms = record.latency_ms;
    state.audit.log(record).await;

    (
        StatusCode::OK,
        Json(AnalyzeResponse {
            request_id,
            allowed: verdict.allowed,
            action: verdict.action.to_string(),
            triggered_policies: matches,
            redacted_prompt,
            latency_ms,
            error_code: None,
            reason: "content analyzed".to_string(),
        }),
    )
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let queue = match &state.infra {
        Some(infra) => match audit_sync_service::queue_depth(&infra.redis).await {
            Ok(depth) => QueueStatsView {
                available: true,
                depth,
                error_code: None,
                reason: "queue stats available".to_string(),
            },
            Err(message) => QueueStatsView {
                available: false,
                depth: 0,
                error_code: Some("QUEUE_UNAVAILABLE".to_string()),
                reason: message,
            },
        },
        None => QueueStatsView {
            available: false,
            depth: 0,
            error_code: Some("QUEUE_UNAVAILABLE".to_string()),
            reason: "redis is not configured".to_string(),
        },
    };

    let snapshot = state.cache.get();
    let m = metrics_service::snapshot();
    let metrics = HealthMetricsView {
        matches_low: m.matches_low,
        matches_medium: m.matches_medium,
        matches_high: m.matches_high,
        matches_critical: m.matches_critical,
        audit_accepted: m.audit_accepted,
        audit_queued: m.audit_queued,
        audit_fallback_sync: m.audit_fallback_sync,
        audit_synced: m.audit_synced,
        audit_requeued: m.audit_requeued,
        audit_parse_dropped: m.audit_parse_dropped,
        audit_queue_depth: m.audit_queue_depth,
    };
    let ok = state.infra.is_some() && queue.available;

    (
        StatusCode::OK,
        Json(HealthResponse {
            ok,
            postgres_available: state.infra.is_some(),
            redis_available: queue.available,
            snapshot_version: snapshot.version,
            policies_cached: snapshot.policies.len(),
            queue,
            metrics,
            reason: if ok { "healthy" } else { "degraded" }.to_string(),
        }),
    )
}

fn audit_record(
    request_id: Uuid,
    req: &AnalyzeRequest,
    matches: &[PolicyMatch],
    action: &str,
    started: &Instant,
) -> AuditLogRecord {
    AuditLogRecord {
        id: Uuid::new_v4(),
        request_id,
        client_id: req.client_id.clone(),
        prompt_hash: sha256_hex(&req.prompt),
        response_hash: sha256_hex(&req.response),
        policies_triggered: matches.iter().map(|m| m.policy_id).collect(),
        action_taken: action.to_string(),
        latency_ms: started.elapsed().as_millis() as i64,
        created_at: Utc::now(),
    }
}

fn error_analyze(
    err: AppError,
    request_id: Uuid,
    started: &Instant,
) -> (StatusCode, Json<AnalyzeResponse>) {
    error!(error_code = err.code, reason = %err.message, request_id = %request_id, "analysis rejected");
    (
        err.status,
        Json(AnalyzeResponse {
            request_id,
            allowed: false,
            action: "block".to_string(),
            triggered_policies: Vec::new(),
            redacted_prompt: String::new(),
            latency_ms: started.elapsed().as_millis() as i64,
            error_code: Some(err.code.to_string()),
            reason: err.message,
        }),
    )
}
