#![forbid(unsafe_code)]

mod cache;
mod cors;
mod geocode;
mod http;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use mgnrega_districts_store::DocumentStore;
use std::sync::Arc;
use std::time::Duration;

pub const CRATE_NAME: &str = "mgnrega-districts-server";
pub const SERVICE_NAME: &str = "mgnrega-districts";

pub use cache::{CacheError, ResponseCache};
pub use geocode::{GeocodeError, NominatimGeocoder, Place, ReverseGeocoder};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Cap on the per-district time series response.
    pub district_limit: usize,
    /// Cap on records returned for a reverse-geocoded place.
    pub place_limit: usize,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub redis_timeout: Duration,
    pub geocoder_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            district_limit: 24,
            place_limit: 200,
            cache_ttl: Duration::from_secs(600),
            cache_max_entries: 500,
            redis_url: None,
            redis_prefix: "mgnrega".to_string(),
            redis_timeout: Duration::from_millis(250),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub cache: Arc<ResponseCache>,
    pub api: Arc<ApiConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
        cache: ResponseCache,
        api: ApiConfig,
    ) -> Self {
        Self {
            store,
            geocoder,
            cache: Arc::new(cache),
            api: Arc::new(api),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::root_handler))
        .route("/health", get(http::health_handler))
        .route(
            "/district/:state_code/:district_code",
            get(http::district_handler),
        )
        .route("/districts/:state_code", get(http::districts_handler))
        .route("/states", get(http::states_handler))
        .route("/whoami", get(http::whoami_handler))
        .layer(from_fn(cors::cors_middleware))
        .with_state(state)
}
