use crate::infra::{InfraClients, AUDIT_QUEUE_KEY};
use crate::module::analyze::model::AuditLogRecord;
use crate::service::metrics_service;
use redis::AsyncCommands;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Asynchronous audit ingress. `log` never blocks on the happy path: records
/// go into a bounded buffer and worker tasks push them onto the Redis queue
/// for the periodic Postgres sync. A full buffer degrades to a synchronous
/// Postgres write on the caller's task so no record is ever dropped silently.
#[derive(Debug)]
pub struct AuditLogger {
    tx: mpsc::Sender<AuditLogRecord>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<AuditLogRecord>>>,
    infra: Option<InfraClients>,
    workers: usize,
    max_push_retries: u32,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AuditLogger {
    pub fn new(
        infra: Option<InfraClients>,
        buffer_size: usize,
        workers: usize,
        max_push_retries: u32,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            infra,
            workers: workers.max(1),
            max_push_retries,
            stop_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn start(self: Arc<Self>) {
        let mut tasks = match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        for worker_id in 0..self.workers {
            let logger = Arc::clone(&self);
            let stop_rx = self.stop_tx.subscribe();
            tasks.push(tokio::spawn(worker(worker_id + 1, logger, stop_rx)));
        }
        info!(workers = self.workers, "audit workers started");
    }

    /// Non-blocking enqueue; falls back to a synchronous durable write when
    /// the buffer is saturated. Backpressure is loud on purpose so operators
    /// can widen the buffer or add workers.
    pub async fn log(&self, record: AuditLogRecord) {
        match self.tx.try_send(record) {
            Ok(()) => metrics_service::inc_audit_accepted(),
            Err(TrySendError::Full(record)) => {
                warn!("audit buffer full, writing synchronously");
                metrics_service::inc_audit_fallback_sync();
                self.write_direct(record).await;
            }
            Err(TrySendError::Closed(record)) => {
                self.write_direct(record).await;
            }
        }
    }

    /// Stops the workers and waits for them to drain whatever the buffer
    /// still holds.
    pub async fn close(&self) {
        let _ = self.stop_tx.send(true);
        let tasks = {
            let mut guard = match self.tasks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            let _ = task.await;
        }
        info!("audit logger stopped");
    }

    async fn push_pending(&self, record: AuditLogRecord) {
        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, request_id = %record.request_id, "audit record serialization failed");
                return;
            }
        };
        let Some(infra) = &self.infra else {
            error!(request_id = %record.request_id, "audit record lost: no backing stores configured");
            return;
        };

        for attempt in 0..=self.max_push_retries {
            match push_once(infra, &payload).await {
                Ok(()) => {
                    metrics_service::inc_audit_queued();
                    return;
                }
                Err(e) => warn!(error = %e, attempt, "audit queue push failed"),
            }
        }

        metrics_service::inc_audit_fallback_sync();
        self.write_direct(record).await;
    }

    async fn write_direct(&self, record: AuditLogRecord) {
        let Some(infra) = &self.infra else {
            error!(request_id = %record.request_id, "audit record lost: durable store unavailable");
            return;
        };
        if let Err(e) = insert_audit_log(&infra.pg, &record).await {
            error!(error = %e, request_id = %record.request_id, "synchronous audit write failed");
        }
    }
}

async fn worker(worker_id: usize, logger: Arc<AuditLogger>, mut stop: watch::Receiver<bool>) {
    loop {
        let next = {
            let mut rx = logger.rx.lock().await;
            tokio::select! {
                item = rx.recv() => item,
                _ = stop.changed() => None,
            }
        };
        match next {
            Some(record) => logger.push_pending(record).await,
            None => break,
        }
    }

    // Drain whatever is left before exiting.
    loop {
        let drained = logger.rx.lock().await.try_recv();
        match drained {
            Ok(record) => logger.push_pending(record).await,
            Err(_) => break,
        }
    }
    debug!(worker = worker_id, "audit worker stopped");
}

async fn push_once(infra: &InfraClients, payload: &str) -> Result<(), String> {
    let mut conn = infra
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| format!("redis connect failed: {e}"))?;
    let _: usize = conn
        .lpush(AUDIT_QUEUE_KEY, payload)
        .await
        .map_err(|e| format!("queue push failed: {e}"))?;
    Ok(())
}

pub async fn insert_audit_log(pool: &PgPool, record: &AuditLogRecord) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO audit_logs (request_id, client_id, prompt_hash, response_hash, \
         policies_triggered, action_taken, latency_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(record.request_id)
    .bind(&record.client_id)
    .bind(&record.prompt_hash)
    .bind(&record.response_hash)
    .bind(&record.policies_triggered)
    .bind(&record.action_taken)
    .bind(record.latency_ms as i32)
    .execute(pool)
    .await
    .map_err(|e| format!("failed to insert audit log: {e}"))?;
    Ok(())
}
