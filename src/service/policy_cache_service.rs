use crate::infra::{InfraClients, POLICY_SNAPSHOT_KEY};
use crate::module::policy::crud;
use crate::module::policy::model::Policy;
use redis::AsyncCommands;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

/// Immutable view of the enabled policies used for one or more evaluations.
/// Mutated only by whole-snapshot replacement.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub version: u64,
    pub policies: Vec<Policy>,
}

impl PolicySnapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            policies: Vec::new(),
        }
    }
}

/// Read cache for enabled policies: in-memory snapshot first, Redis mirror
/// second, Postgres as the source of truth. Readers share the published
/// snapshot by reference; a refresh swaps the whole pointer.
#[derive(Debug)]
pub struct PolicyCache {
    snapshot: RwLock<Arc<PolicySnapshot>>,
    refresh_gate: Mutex<()>,
    infra: Option<InfraClients>,
    refresh_seconds: u64,
    stop_tx: watch::Sender<bool>,
}

impl PolicyCache {
    pub fn new(infra: Option<InfraClients>, refresh_seconds: u64) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            snapshot: RwLock::new(Arc::new(PolicySnapshot::empty())),
            refresh_gate: Mutex::new(()),
            infra,
            refresh_seconds,
            stop_tx,
        })
    }

    /// Initial synchronous load, then the background refresh loop.
    pub async fn start(self: Arc<Self>) -> Result<(), String> {
        self.refresh().await?;
        info!(
            policies = self.get().policies.len(),
            interval_seconds = self.refresh_seconds,
            "policy cache started"
        );
        let stop_rx = self.stop_tx.subscribe();
        tokio::spawn(refresh_loop(self, stop_rx));
        Ok(())
    }

    /// Current snapshot. Concurrent readers around a swap see either the old
    /// or the new snapshot whole, never a mixture.
    pub fn get(&self) -> Arc<PolicySnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new policy set. The version counter only moves forward.
    pub fn publish(&self, policies: Vec<Policy>) -> u64 {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let version = guard.version + 1;
        *guard = Arc::new(PolicySnapshot { version, policies });
        version
    }

    /// Immediate refresh. A refresh already in flight satisfies the request,
    /// so a create racing the ticker does not load twice.
    pub async fn invalidate(&self) -> Result<(), String> {
        match self.refresh_gate.try_lock() {
            Ok(_gate) => self.load().await,
            Err(_) => {
                let _gate = self.refresh_gate.lock().await;
                Ok(())
            }
        }
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    async fn refresh(&self) -> Result<(), String> {
        let _gate = self.refresh_gate.lock().await;
        self.load().await
    }

    async fn load(&self) -> Result<(), String> {
        let Some(infra) = &self.infra else {
            return Ok(());
        };

        match crud::list_enabled(&infra.pg).await {
            Ok(policies) => {
                let count = policies.len();
                self.mirror_to_redis(infra, &policies).await;
                let version = self.publish(policies);
                info!(policies = count, version, "policy snapshot published");
                Ok(())
            }
            Err(err) => {
                // The previous snapshot keeps serving. A cold cache can still
                // come up from the Redis mirror written by a healthier run.
                if self.get().version == 0 {
                    if let Some(policies) = self.read_redis_mirror(infra).await {
                        let count = policies.len();
                        let version = self.publish(policies);
                        warn!(
                            error = %err.message,
                            policies = count,
                            version,
                            "postgres load failed, serving redis snapshot mirror"
                        );
                        return Ok(());
                    }
                }
                Err(format!("policy load failed: {}", err.message))
            }
        }
    }

    async fn mirror_to_redis(&self, infra: &InfraClients, policies: &[Policy]) {
        let payload = match serde_json::to_string(policies) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "policy snapshot mirror encode failed");
                return;
            }
        };
        let mut conn = match infra.redis.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "redis connect failed for snapshot mirror");
                return;
            }
        };
        // Twice the refresh interval: the mirror outlives one missed tick.
        let ttl = self.refresh_seconds.max(1) * 2;
        let written: Result<(), redis::RedisError> =
            conn.set_ex(POLICY_SNAPSHOT_KEY, payload, ttl).await;
        if let Err(e) = written {
            warn!(error = %e, "policy snapshot mirror write failed");
        }
    }

    async fn read_redis_mirror(&self, infra: &InfraClients) -> Option<Vec<Policy>> {
        let mut conn = infra.redis.get_multiplexed_async_connection().await.ok()?;
        let raw: Option<String> = conn.get(POLICY_SNAPSHOT_KEY).await.ok()?;
        serde_json::from_str(&raw?).ok()
    }
}

async fn refresh_loop(cache: Arc<PolicyCache>, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(cache.refresh_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial load already ran.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = cache.refresh().await {
                    warn!(error = %e, "policy cache refresh failed");
                }
            }
            _ = stop.changed() => {
                info!("policy cache refresh loop stopped");
                return;
            }
        }
    }
}
