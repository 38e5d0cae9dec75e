use crate::infra::{InfraClients, AUDIT_QUEUE_KEY};
use crate::module::analyze::model::AuditLogRecord;
use crate::service::audit_service::insert_audit_log;
use crate::service::metrics_service;
use redis::AsyncCommands;
use redis::Client as RedisClient;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Records popped per drain cycle.
const DRAIN_BATCH_SIZE: usize = 10_000;
/// Rows per INSERT statement: 7 binds each, kept well under the Postgres
/// 65535 bind-parameter cap.
const INSERT_CHUNK_ROWS: usize = 5_000;
/// The final drain on shutdown may not hold the process longer than this.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Periodically moves audit records from the Redis queue into Postgres.
/// Pops are destructive, so anything that fails to land durably is pushed
/// back for the next cycle. Delivery is at-least-once; downstream dedupes on
/// (request_id, id).
pub async fn run(infra: InfraClients, interval_seconds: u64, mut stop: watch::Receiver<bool>) {
    info!(interval_seconds, "audit sync worker started");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = drain_cycle(&infra).await {
                    warn!(error = %e, "audit sync cycle failed");
                }
            }
            _ = stop.changed() => {
                match tokio::time::timeout(STOP_GRACE, drain_cycle(&infra)).await {
                    Ok(Ok(())) => info!("audit sync worker stopped"),
                    Ok(Err(e)) => warn!(error = %e, "final audit drain failed"),
                    Err(_) => warn!("final audit drain exceeded grace period, residual records stay queued"),
                }
                return;
            }
        }
    }
}

pub async fn queue_depth(redis: &RedisClient) -> Result<i64, String> {
    let mut conn = redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| format!("redis connect failed: {e}"))?;
    let depth: i64 = conn
        .llen(AUDIT_QUEUE_KEY)
        .await
        .map_err(|e| format!("queue len failed: {e}"))?;
    Ok(depth)
}

pub async fn drain_cycle(infra: &InfraClients) -> Result<(), String> {
    let mut conn = infra
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| format!("redis connect failed: {e}"))?;

    let depth: i64 = conn
        .llen(AUDIT_QUEUE_KEY)
        .await
        .map_err(|e| format!("queue len failed: {e}"))?;
    metrics_service::set_audit_queue_depth(depth);
    if depth == 0 {
        return Ok(());
    }

    // RPOP takes the oldest entries; workers push new ones at the other end.
    let popped: Option<Vec<String>> = redis::cmd("RPOP")
        .arg(AUDIT_QUEUE_KEY)
        .arg(DRAIN_BATCH_SIZE)
        .query_async(&mut conn)
        .await
        .map_err(|e| format!("queue pop failed: {e}"))?;
    let raw = popped.unwrap_or_default();
    if raw.is_empty() {
        return Ok(());
    }

    let (entries, dropped) = parse_pending(raw);
    if dropped > 0 {
        metrics_service::add_audit_parse_dropped(dropped as u64);
    }
    if entries.is_empty() {
        return Ok(());
    }

    match bulk_insert(&infra.pg, &entries).await {
        Ok(()) => {
            metrics_service::add_audit_synced(entries.len() as u64);
            info!(count = entries.len(), "audit records bulk synced");
        }
        Err(e) => {
            warn!(error = %e, "bulk insert failed, falling back to per-record inserts");
            let mut synced = 0u64;
            let mut requeued = 0u64;
            for (record, raw_entry) in &entries {
                match insert_audit_log(&infra.pg, record).await {
                    Ok(()) => synced += 1,
                    Err(insert_err) => {
                        warn!(error = %insert_err, request_id = %record.request_id, "audit record insert failed, re-queueing");
                        let pushed: Result<usize, redis::RedisError> =
                            conn.lpush(AUDIT_QUEUE_KEY, raw_entry).await;
                        if let Err(push_err) = pushed {
                            warn!(error = %push_err, request_id = %record.request_id, "audit record re-queue failed");
                        } else {
                            requeued += 1;
                        }
                    }
                }
            }
            metrics_service::add_audit_synced(synced);
            metrics_service::add_audit_requeued(requeued);
            info!(synced, requeued, "audit records synced in fallback mode");
        }
    }

    Ok(())
}

/// Splits a popped batch into parseable records (paired with their original
/// payload so a failed insert can re-queue the exact bytes) and a count of
/// entries dropped as unparseable.
pub fn parse_pending(raw: Vec<String>) -> (Vec<(AuditLogRecord, String)>, usize) {
    let mut entries = Vec::with_capacity(raw.len());
    let mut dropped = 0;
    for payload in raw {
        match serde_json::from_str::<AuditLogRecord>(&payload) {
            Ok(record) => entries.push((record, payload)),
            Err(e) => {
                warn!(error = %e, "dropping unparseable audit record");
                dropped += 1;
            }
        }
    }
    (entries, dropped)
}

/// One transaction for the whole batch: every chunk lands or none do.
async fn bulk_insert(pool: &PgPool, entries: &[(AuditLogRecord, String)]) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("failed to begin transaction: {e}"))?;

    for chunk in entries.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO audit_logs (request_id, client_id, prompt_hash, response_hash, \
             policies_triggered, action_taken, latency_ms) ",
        );
        builder.push_values(chunk, |mut row, (record, _)| {
            row.push_bind(record.request_id)
                .push_bind(&record.client_id)
                .push_bind(&record.prompt_hash)
                .push_bind(&record.response_hash)
                .push_bind(&record.policies_triggered)
                .push_bind(&record.action_taken)
                .push_bind(record.latency_ms as i32);
        });
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| format!("bulk insert failed: {e}"))?;
    }

    tx.commit()
        .await
        .map_err(|e| format!("failed to commit audit batch: {e}"))?;
    Ok(())
}
