use crate::{AppState, GeocodeError, SERVICE_NAME};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use mgnrega_districts_store::{DistrictQuery, StoreError};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info};

pub(crate) async fn root_handler() -> impl IntoResponse {
    Json(json!({ "ok": true, "service": SERVICE_NAME }))
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

fn normalize_query(params: &HashMap<String, String>) -> String {
    let mut kv: Vec<(&String, &String)> = params.iter().collect();
    kv.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));
    kv.into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn cache_key(route: &str, params: &HashMap<String, String>) -> String {
    format!("{route}?{}", normalize_query(params))
}

fn json_response(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn store_error_response(route: &str, err: &StoreError) -> Response {
    error!(route, error = %err, "store operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// Serve `payload` and remember it under `key` for the fixed TTL.
async fn respond_and_cache(state: &AppState, key: String, payload: &Value) -> Response {
    match serde_json::to_vec(payload) {
        Ok(body) => {
            state.cache.set(&key, body.clone()).await;
            json_response(body)
        }
        Err(e) => {
            error!(error = %e, "response serialization failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal serialization error" })),
            )
                .into_response()
        }
    }
}

pub(crate) async fn district_handler(
    State(state): State<AppState>,
    Path((state_code, district_code)): Path<(i64, i64)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let key = cache_key(&format!("/district/{state_code}/{district_code}"), &params);
    if let Some(body) = state.cache.get(&key).await {
        return json_response(body);
    }
    let query = DistrictQuery {
        state_code,
        district_code,
        month: params.get("month").cloned(),
        fin_year: params.get("fin_year").cloned(),
        limit: state.api.district_limit,
    };
    match state.store.query_district(&query).await {
        Ok(records) => {
            let payload = json!({ "count": records.len(), "data": records });
            respond_and_cache(&state, key, &payload).await
        }
        Err(e) => store_error_response("/district", &e),
    }
}

pub(crate) async fn districts_handler(
    State(state): State<AppState>,
    Path(state_code): Path<i64>,
) -> Response {
    let key = format!("/districts/{state_code}");
    if let Some(body) = state.cache.get(&key).await {
        return json_response(body);
    }
    match state.store.list_districts(state_code).await {
        Ok(list) if list.is_empty() => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "count": 0,
                "data": [],
                "message": format!(
                    "No districts found for state_code={state_code}. Try GET /states to see available states."
                ),
            })),
        )
            .into_response(),
        Ok(list) => {
            let payload = json!({ "count": list.len(), "data": list });
            respond_and_cache(&state, key, &payload).await
        }
        Err(e) => store_error_response("/districts", &e),
    }
}

pub(crate) async fn states_handler(State(state): State<AppState>) -> Response {
    let key = "/states".to_string();
    if let Some(body) = state.cache.get(&key).await {
        return json_response(body);
    }
    match state.store.list_states().await {
        Ok(list) => {
            let payload = json!({ "count": list.len(), "data": list });
            respond_and_cache(&state, key, &payload).await
        }
        Err(e) => store_error_response("/states", &e),
    }
}

pub(crate) async fn whoami_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (Some(lat), Some(lon)) = (params.get("lat"), params.get("lon")) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Provide lat and lon" })),
        )
            .into_response();
    };
    let lang = params.get("lang").map(String::as_str);

    let key = cache_key("/whoami", &params);
    if let Some(body) = state.cache.get(&key).await {
        return json_response(body);
    }

    let place = match state.geocoder.reverse(lat, lon, lang).await {
        Ok(place) => place,
        Err(GeocodeError::Upstream(status)) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Reverse geocode failed", "status": status })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "reverse geocode failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if place.district.is_none() && place.state.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Could not determine district or state from coordinates",
                "address": place.address,
            })),
        )
            .into_response();
    }
    info!(
        district = place.district.as_deref().unwrap_or("-"),
        state = place.state.as_deref().unwrap_or("-"),
        "whoami place detected"
    );

    let records = match state
        .store
        .find_by_place(
            place.district.as_deref(),
            place.state.as_deref(),
            state.api.place_limit,
        )
        .await
    {
        Ok(records) => records,
        Err(e) => return store_error_response("/whoami", &e),
    };

    let detected = json!({ "district": place.district, "state": place.state });
    if records.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "message": "No records found for detected place",
                "detected": detected,
                "address": place.address,
            })),
        )
            .into_response();
    }

    // simple time series grouped by fiscal year + month, newest first
    let timeseries: Vec<Value> = records
        .iter()
        .map(|r| json!({ "fin_year": r.fin_year, "month": r.month, "payload": r }))
        .collect();
    let payload = json!({
        "ok": true,
        "detected": detected,
        "count": records.len(),
        "timeseries": timeseries,
        "records": records,
    });
    respond_and_cache(&state, key, &payload).await
}
