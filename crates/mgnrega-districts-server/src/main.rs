#![forbid(unsafe_code)]

use mgnrega_districts_core::ExitCode;
use mgnrega_districts_server::{
    build_router, ApiConfig, AppState, NominatimGeocoder, ResponseCache,
};
use mgnrega_districts_store::SqliteStore;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ENV_PORT: &str = "PORT";
const ENV_DB_PATH: &str = "MGNREGA_DB_PATH";
const ENV_REDIS_URL: &str = "REDIS_URL";
const ENV_LOG_LEVEL: &str = "MGNREGA_LOG_LEVEL";
const ENV_CACHE_TTL_SECS: &str = "MGNREGA_CACHE_TTL_SECS";
const ENV_GEOCODER_URL: &str = "MGNREGA_GEOCODER_URL";

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run() -> Result<(), String> {
    let db_path = PathBuf::from(env_str(ENV_DB_PATH, "data/mgnrega.db"));
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("create {}: {e}", parent.display()))?;
        }
    }

    let api = ApiConfig {
        cache_ttl: Duration::from_secs(env_u64(ENV_CACHE_TTL_SECS, 600)),
        redis_url: env::var(ENV_REDIS_URL).ok().filter(|v| !v.is_empty()),
        geocoder_url: env_str(ENV_GEOCODER_URL, "https://nominatim.openstreetmap.org"),
        ..ApiConfig::default()
    };

    let cache = match &api.redis_url {
        Some(url) => ResponseCache::with_redis(
            api.cache_ttl,
            api.cache_max_entries,
            url,
            &api.redis_prefix,
            api.redis_timeout,
        )
        .map_err(|e| format!("redis cache: {e}"))?,
        None => ResponseCache::new(api.cache_ttl, api.cache_max_entries),
    };

    let store = SqliteStore::open(&db_path).map_err(|e| e.to_string())?;
    let geocoder = NominatimGeocoder::new(api.geocoder_url.clone())
        .map_err(|e| format!("geocoder client: {e}"))?;

    let state = AppState::new(Arc::new(store), Arc::new(geocoder), cache, api);
    let app = build_router(state);

    let port = env_u16(ENV_PORT, 3000);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| format!("bind port {port}: {e}"))?;
    info!(port, db = %db_path.display(), "server listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("serve: {e}"))
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::Failure.into()
        }
    }
}
