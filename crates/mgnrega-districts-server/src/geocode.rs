// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const REVERSE_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "mgnrega-districts/0.1 (contact: none)";

/// Place detected for a coordinate pair. `address` carries the raw
/// geocoder address object for diagnostics; no accuracy guarantee is made.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub district: Option<String>,
    pub state: Option<String>,
    pub address: Value,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum GeocodeError {
    Unreachable(String),
    /// Geocoder answered with a non-success status.
    Upstream(u16),
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(msg) => write!(f, "geocoder unreachable: {msg}"),
            Self::Upstream(status) => write!(f, "geocoder upstream status {status}"),
        }
    }
}

impl std::error::Error for GeocodeError {}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync + 'static {
    async fn reverse(
        &self,
        lat: &str,
        lon: &str,
        lang: Option<&str>,
    ) -> Result<Place, GeocodeError>;
}

/// Nominatim reverse-geocoding client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(REVERSE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GeocodeError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

fn pick_name(address: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| address.get(k).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(
        &self,
        lat: &str,
        lon: &str,
        lang: Option<&str>,
    ) -> Result<Place, GeocodeError> {
        let mut request = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json"),
                ("lat", lat),
                ("lon", lon),
                ("zoom", "10"),
                ("addressdetails", "1"),
            ])
            .header("accept", "application/json");
        if let Some(lang) = lang {
            request = request.header("accept-language", lang);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GeocodeError::Unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GeocodeError::Upstream(response.status().as_u16()));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| GeocodeError::Unreachable(e.to_string()))?;
        let address = body.get("address").cloned().unwrap_or(Value::Null);

        // Nominatim spreads the district over different fields depending
        // on the place kind.
        let district = pick_name(
            &address,
            &["city", "county", "state_district", "town", "village"],
        );
        let state = pick_name(&address, &["state", "region"]);
        Ok(Place {
            district,
            state,
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn district_field_fallback_order() {
        let address = json!({"county": "Agra", "state_district": "Agra Division", "state": "Uttar Pradesh"});
        assert_eq!(
            pick_name(&address, &["city", "county", "state_district", "town", "village"]),
            Some("Agra".to_string())
        );
        assert_eq!(pick_name(&address, &["state", "region"]), Some("Uttar Pradesh".to_string()));
        assert_eq!(pick_name(&json!({}), &["state", "region"]), None);
    }
}
