use crate::module::policy::model::Severity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub client_id: String,
    pub prompt: String,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMatch {
    pub policy_id: Uuid,
    pub policy_name: String,
    pub severity: Severity,
    pub matched_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub request_id: Uuid,
    pub allowed: bool,
    pub action: String,
    pub triggered_policies: Vec<PolicyMatch>,
    #[serde(default)]
    pub redacted_prompt: String,
    pub latency_ms: i64,
    pub error_code: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsView {
    pub available: bool,
    pub depth: i64,
    pub error_code: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetricsView {
    pub matches_low: u64,
    pub matches_medium: u64,
    pub matches_high: u64,
    pub matches_critical: u64,
    pub audit_accepted: u64,
    pub audit_queued: u64,
    pub audit_fallback_sync: u64,
    pub audit_synced: u64,
    pub audit_requeued: u64,
    pub audit_parse_dropped: u64,
    pub audit_queue_depth: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub postgres_available: bool,
    pub redis_available: bool,
    pub snapshot_version: u64,
    pub policies_cached: usize,
    pub queue: QueueStatsView,
    pub metrics: HealthMetricsView,
    pub reason: String,
}
