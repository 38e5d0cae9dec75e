use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rust_env: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub model_api_key: String,
    pub model_endpoint_url: String,
    pub db_max_open_conns: u32,
    pub db_max_idle_conns: u32,
    pub request_timeout_seconds: u64,
    pub audit_buffer_size: usize,
    pub audit_workers: usize,
    pub audit_sync_interval_seconds: u64,
    pub cache_refresh_seconds: u64,
    pub redis_pool_size: u32,
    pub redis_min_idle: u32,
    pub redis_pool_timeout_seconds: u64,
    pub redis_max_retries: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        Ok(Self {
            rust_env: read_optional_string("RUST_ENV", "development"),
            port: read_optional_u64("PORT", 8080)? as u16,
            database_url: read_var("DATABASE_URL")?,
            redis_url: read_var("REDIS_URL")?,
            model_api_key: read_var("MODEL_API_KEY")?,
            model_endpoint_url: read_optional_string(
                "MODEL_ENDPOINT_URL",
                "https://integrate.api.nvidia.com/v1/chat/completions",
            ),
            db_max_open_conns: read_optional_u32("DB_MAX_OPEN_CONNS", 20)?,
            db_max_idle_conns: read_optional_u32("DB_MAX_IDLE_CONNS", 20)?,
            request_timeout_seconds: read_optional_u64("REQUEST_TIMEOUT_SECONDS", 300)?,
            audit_buffer_size: read_optional_u64("AUDIT_BUFFER_SIZE", 500_000)? as usize,
            audit_workers: read_optional_u64("AUDIT_WORKERS", 100)? as usize,
            audit_sync_interval_seconds: read_optional_u64("AUDIT_SYNC_INTERVAL_SECONDS", 90)?,
            cache_refresh_seconds: read_optional_u64("CACHE_REFRESH_SECONDS", 600)?,
            redis_pool_size: read_optional_u32("REDIS_POOL_SIZE", 100)?,
            redis_min_idle: read_optional_u32("REDIS_MIN_IDLE", 20)?,
            redis_pool_timeout_seconds: read_optional_u64("REDIS_POOL_TIMEOUT_SECONDS", 4)?,
            redis_max_retries: read_optional_u32("REDIS_MAX_RETRIES", 3)?,
        })
    }
}

fn read_var(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("missing required env var: {key}"))
}

fn read_optional_u64(key: &str, default: u64) -> Result<u64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_u32(key: &str, default: u32) -> Result<u32, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u32>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_dotenv_layers() {
    for path in [".env", "../.env"] {
        let _ = dotenvy::from_path_override(path);
    }
}
