use crate::module::policy::model::Severity;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

static MATCHES_LOW: AtomicU64 = AtomicU64::new(0);
static MATCHES_MEDIUM: AtomicU64 = AtomicU64::new(0);
static MATCHES_HIGH: AtomicU64 = AtomicU64::new(0);
static MATCHES_CRITICAL: AtomicU64 = AtomicU64::new(0);

static AUDIT_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static AUDIT_QUEUED: AtomicU64 = AtomicU64::new(0);
static AUDIT_FALLBACK_SYNC: AtomicU64 = AtomicU64::new(0);
static AUDIT_SYNCED: AtomicU64 = AtomicU64::new(0);
static AUDIT_REQUEUED: AtomicU64 = AtomicU64::new(0);
static AUDIT_PARSE_DROPPED: AtomicU64 = AtomicU64::new(0);

static AUDIT_QUEUE_DEPTH: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
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

pub fn inc_policy_match(severity: Severity) {
    let counter = match severity {
        Severity::Low => &MATCHES_LOW,
        Severity::Medium => &MATCHES_MEDIUM,
        Severity::High => &MATCHES_HIGH,
        Severity::Critical => &MATCHES_CRITICAL,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_audit_accepted() {
    AUDIT_ACCEPTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_audit_queued() {
    AUDIT_QUEUED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_audit_fallback_sync() {
    AUDIT_FALLBACK_SYNC.fetch_add(1, Ordering::Relaxed);
}

pub fn add_audit_synced(count: u64) {
    AUDIT_SYNCED.fetch_add(count, Ordering::Relaxed);
}

pub fn add_audit_requeued(count: u64) {
    AUDIT_REQUEUED.fetch_add(count, Ordering::Relaxed);
}

pub fn add_audit_parse_dropped(count: u64) {
    AUDIT_PARSE_DROPPED.fetch_add(count, Ordering::Relaxed);
}

pub fn set_audit_queue_depth(depth: i64) {
    AUDIT_QUEUE_DEPTH.store(depth, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        matches_low: MATCHES_LOW.load(Ordering::Relaxed),
        matches_medium: MATCHES_MEDIUM.load(Ordering::Relaxed),
        matches_high: MATCHES_HIGH.load(Ordering::Relaxed),
        matches_critical: MATCHES_CRITICAL.load(Ordering::Relaxed),
        audit_accepted: AUDIT_ACCEPTED.load(Ordering::Relaxed),
        audit_queued: AUDIT_QUEUED.load(Ordering::Relaxed),
        audit_fallback_sync: AUDIT_FALLBACK_SYNC.load(Ordering::Relaxed),
        audit_synced: AUDIT_SYNCED.load(Ordering::Relaxed),
        audit_requeued: AUDIT_REQUEUED.load(Ordering::Relaxed),
        audit_parse_dropped: AUDIT_PARSE_DROPPED.load(Ordering::Relaxed),
        audit_queue_depth: AUDIT_QUEUE_DEPTH.load(Ordering::Relaxed),
    }
}
