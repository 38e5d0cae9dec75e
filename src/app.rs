use crate::config::environment::AppConfig;
use crate::infra::InfraClients;
use crate::module::{analyze, policy};
use crate::service::analyzer_service::Analyzer;
use crate::service::audit_service::AuditLogger;
use crate::service::model_client_service::ModelClient;
use crate::service::policy_cache_service::PolicyCache;
use axum::http::Method;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub infra: Option<InfraClients>,
    pub cache: Arc<PolicyCache>,
    pub analyzer: Arc<Analyzer>,
    pub audit: Arc<AuditLogger>,
}

impl AppState {
    pub fn new(config: AppConfig, infra: Option<InfraClients>) -> Result<Self, String> {
        let model = ModelClient::new(
            config.model_api_key.clone(),
            config.model_endpoint_url.clone(),
        )?;
        let cache = PolicyCache::new(infra.clone(), config.cache_refresh_seconds);
        let audit = AuditLogger::new(
            infra.clone(),
            config.audit_buffer_size,
            config.audit_workers,
            config.redis_max_retries,
        );
        Ok(Self {
            config,
            infra,
            cache,
            analyzer: Arc::new(Analyzer::new(Some(model))),
            audit,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    policy::route::register_routes(state.clone())
        .merge(analyze::route::register_routes(state))
        .layer(cors)
}
