#![allow(dead_code)]

use chrono::Utc;
use prompt_gateway::app::AppState;
use prompt_gateway::config::environment::AppConfig;
use prompt_gateway::module::policy::model::{PatternKind, Policy, PolicyAction, Severity};
use uuid::Uuid;

pub fn test_config() -> AppConfig {
    AppConfig {
        rust_env: "test".to_string(),
        port: 0,
        database_url: "postgres://127.0.0.1/prompt_gateway_test".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        model_api_key: "test-key".to_string(),
        model_endpoint_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
        db_max_open_conns: 5,
        db_max_idle_conns: 5,
        request_timeout_seconds: 5,
        audit_buffer_size: 64,
        audit_workers: 2,
        audit_sync_interval_seconds: 60,
        cache_refresh_seconds: 600,
        redis_pool_size: 10,
        redis_min_idle: 1,
        redis_pool_timeout_seconds: 1,
        redis_max_retries: 1,
    }
}

pub fn seed_policy(
    name: &str,
    pattern_type: PatternKind,
    pattern_value: &str,
    severity: Severity,
    action: PolicyAction,
) -> Policy {
    let now = Utc::now();
    Policy {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        pattern_type,
        pattern_value: pattern_value.to_string(),
        severity,
        action,
        enabled: true,
        created_at: now,
        updated_at: now,
    }
}

/// Gateway state with no backing stores and the given policies published as
/// the current snapshot.
pub fn seeded_state(policies: Vec<Policy>) -> AppState {
    let state = AppState::new(test_config(), None).expect("state init");
    state.cache.publish(policies);
    state
}
