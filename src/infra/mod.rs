use crate::config::environment::AppConfig;
use redis::Client as RedisClient;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InfraClients {
    pub pg: PgPool,
    pub redis: RedisClient,
}

/// Redis list holding serialized audit records awaiting the Postgres sync.
pub const AUDIT_QUEUE_KEY: &str = "audit_logs:pending";
/// Redis mirror of the most recent enabled-policy snapshot.
pub const POLICY_SNAPSHOT_KEY: &str = "policies:snapshot";

pub async fn init_infra(config: &AppConfig) -> Result<InfraClients, String> {
    let pg = PgPoolOptions::new()
        .max_connections(config.db_max_open_conns)
        .min_connections(config.db_max_idle_conns.min(config.db_max_open_conns))
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .map_err(|e| format!("postgres init failed: {e}"))?;

    let redis = RedisClient::open(config.redis_url.clone())
        .map_err(|e| format!("redis init failed: {e}"))?;

    Ok(InfraClients { pg, redis })
}
