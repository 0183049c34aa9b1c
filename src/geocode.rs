//! Forward-geocoding client.
//!
//! Maps a free-text address to the best candidate returned by a
//! Google-Geocoding-shaped service. Zero results, non-OK statuses,
//! transport failures and malformed payloads all collapse to the
//! all-absent `GeocodeResult`; the batch never aborts because one
//! address failed to geocode.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::GeocodeResult;
use reqwest::Client;
use serde_json::Value;

pub struct GeocodeService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeocodeService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .geocode_api_key
            .clone()
            .ok_or_else(|| AppError::ConfigError("GEOCODE_API_KEY is required".to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create geocode client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.geocode_base_url.clone(),
            api_key,
        })
    }

    /// Geocodes a single address. Always returns a result; every failure
    /// mode degrades to the all-absent shape.
    pub async fn geocode_address(&self, address: &str) -> GeocodeResult {
        if address.trim().is_empty() {
            return GeocodeResult::default();
        }

        let url = match reqwest::Url::parse_with_params(
            &self.base_url,
            &[("address", address), ("key", self.api_key.as_str())],
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Failed to build geocode URL for '{}': {}", address, e);
                return GeocodeResult::default();
            }
        };

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Geocode request failed for '{}': {}", address, e);
                return GeocodeResult::default();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Geocode service returned status {} for '{}'",
                response.status(),
                address
            );
            return GeocodeResult::default();
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to parse geocode response for '{}': {}", address, e);
                return GeocodeResult::default();
            }
        };

        let result = parse_best_candidate(&body);
        if result == GeocodeResult::default() {
            tracing::warn!("Geocode returned no usable candidate for '{}'", address);
        }
        result
    }
}

/// Pulls the highest-ranked candidate out of a geocoding payload and scans
/// its address components for the postal-code, locality and first-level
/// administrative-area roles. A missing role leaves the field absent.
fn parse_best_candidate(body: &Value) -> GeocodeResult {
    let mut geo = GeocodeResult::default();

    let top = match body
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
    {
        Some(top) => top,
        None => return geo,
    };

    geo.formatted_address = top
        .get("formatted_address")
        .and_then(|v| v.as_str())
        .map(String::from);

    if let Some(location) = top.get("geometry").and_then(|g| g.get("location")) {
        geo.latitude = location.get("lat").and_then(|v| v.as_f64());
        geo.longitude = location.get("lng").and_then(|v| v.as_f64());
    }

    if let Some(components) = top.get("address_components").and_then(|v| v.as_array()) {
        for component in components {
            let types: Vec<&str> = component
                .get("types")
                .and_then(|t| t.as_array())
                .map(|t| t.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let long_name = component
                .get("long_name")
                .and_then(|v| v.as_str())
                .map(String::from);

            if types.contains(&"postal_code") {
                geo.pincode = long_name.clone();
            }
            if types.contains(&"locality") {
                geo.city = long_name.clone();
            }
            if types.contains(&"administrative_area_level_1") {
                geo.state = long_name;
            }
        }
    }

    geo
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_components_by_role() {
        let body = json!({
            "results": [{
                "formatted_address": "12 MG Road, Pune, Maharashtra 411001, India",
                "geometry": { "location": { "lat": 18.5204, "lng": 73.8567 } },
                "address_components": [
                    { "long_name": "411001", "types": ["postal_code"] },
                    { "long_name": "Pune", "types": ["locality", "political"] },
                    { "long_name": "Maharashtra",
                      "types": ["administrative_area_level_1", "political"] }
                ]
            }]
        });

        let geo = parse_best_candidate(&body);
        assert_eq!(geo.pincode.as_deref(), Some("411001"));
        assert_eq!(geo.city.as_deref(), Some("Pune"));
        assert_eq!(geo.state.as_deref(), Some("Maharashtra"));
        assert_eq!(geo.latitude, Some(18.5204));
        assert_eq!(geo.longitude, Some(73.8567));
    }

    #[test]
    fn missing_roles_stay_absent() {
        let body = json!({
            "results": [{
                "formatted_address": "Somewhere",
                "geometry": { "location": { "lat": 20.0, "lng": 75.0 } },
                "address_components": []
            }]
        });

        let geo = parse_best_candidate(&body);
        assert_eq!(geo.pincode, None);
        assert_eq!(geo.city, None);
        assert_eq!(geo.state, None);
        assert_eq!(geo.formatted_address.as_deref(), Some("Somewhere"));
    }

    #[test]
    fn zero_results_yield_all_absent() {
        let body = json!({ "results": [], "status": "ZERO_RESULTS" });
        assert_eq!(parse_best_candidate(&body), GeocodeResult::default());
    }

    #[test]
    fn first_candidate_wins() {
        let body = json!({
            "results": [
                { "formatted_address": "First",
                  "geometry": { "location": { "lat": 1.0, "lng": 2.0 } } },
                { "formatted_address": "Second",
                  "geometry": { "location": { "lat": 3.0, "lng": 4.0 } } }
            ]
        });
        let geo = parse_best_candidate(&body);
        assert_eq!(geo.formatted_address.as_deref(), Some("First"));
    }
}
