use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hash-only summary of one evaluation, immutable once enqueued. Unknown
/// fields are ignored on read so older gateways can drain newer queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub request_id: Uuid,
    pub client_id: String,
    pub prompt_hash: String,
    #[serde(default)]
    pub response_hash: String,
    pub policies_triggered: Vec<Uuid>,
    pub action_taken: String,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}
