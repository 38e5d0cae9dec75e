use prompt_gateway::app::{build_router, AppState};
use prompt_gateway::config::environment::AppConfig;
use prompt_gateway::infra::init_infra;
use prompt_gateway::service::audit_sync_service;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_logging();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "config error");
            std::process::exit(1);
        }
    };

    let infra = match init_infra(&config).await {
        Ok(i) => i,
        Err(e) => {
            error!(error = %e, "infra init failed");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config.clone(), Some(infra.clone())) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "state init failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = state.cache.clone().start().await {
        error!(error = %e, "policy cache start failed");
        std::process::exit(1);
    }
    state.audit.clone().start();

    let (drain_stop_tx, drain_stop_rx) = watch::channel(false);
    let drainer = tokio::spawn(audit_sync_service::run(
        infra.clone(),
        config.audit_sync_interval_seconds,
        drain_stop_rx,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, bind_addr = %bind_addr, "server bind error");
            std::process::exit(1);
        }
    };

    info!(
        env = %config.rust_env,
        port = config.port,
        audit_workers = config.audit_workers,
        audit_buffer = config.audit_buffer_size,
        cache_refresh_seconds = config.cache_refresh_seconds,
        audit_sync_interval_seconds = config.audit_sync_interval_seconds,
        request_timeout_seconds = config.request_timeout_seconds,
        redis_pool_size = config.redis_pool_size,
        redis_min_idle = config.redis_min_idle,
        redis_pool_timeout_seconds = config.redis_pool_timeout_seconds,
        "prompt gateway started"
    );

    let app = build_router(state.clone());
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server runtime error");
    }

    info!("shutting down");
    state.cache.stop();
    state.audit.close().await;
    let _ = drain_stop_tx.send(true);
    if let Err(e) = drainer.await {
        warn!(error = %e, "audit sync worker join failed");
    }
    info!("shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
