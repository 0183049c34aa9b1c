//! Geocoding client tests against a mocked forward-geocoding service.

use rust_geo_pipeline::config::Config;
use rust_geo_pipeline::geocode::GeocodeService;
use rust_geo_pipeline::models::GeocodeResult;
use rust_geo_pipeline::pipeline::run_geocode;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: String) -> Config {
    Config {
        geocode_api_key: Some("test_key".to_string()),
        geocode_base_url: base_url,
        geocode_pacing_ms: 1,
        ..Config::default()
    }
}

fn pune_payload() -> serde_json::Value {
    serde_json::json!({
        "status": "OK",
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
    })
}

#[tokio::test]
async fn maps_best_candidate_into_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .and(query_param("address", "12 MG Road Pune"))
        .and(query_param("key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pune_payload()))
        .mount(&server)
        .await;

    let config = test_config(format!("{}/geocode/json", server.uri()));
    let service = GeocodeService::new(&config).unwrap();
    let geo = service.geocode_address("12 MG Road Pune").await;

    assert_eq!(geo.pincode.as_deref(), Some("411001"));
    assert_eq!(geo.city.as_deref(), Some("Pune"));
    assert_eq!(geo.state.as_deref(), Some("Maharashtra"));
    assert_eq!(geo.latitude, Some(18.5204));
    assert_eq!(geo.longitude, Some(73.8567));
}

#[tokio::test]
async fn zero_results_yield_all_absent_without_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ZERO_RESULTS",
            "results": []
        })))
        .mount(&server)
        .await;

    let config = test_config(format!("{}/geocode/json", server.uri()));
    let service = GeocodeService::new(&config).unwrap();
    let geo = service.geocode_address("nowhere at all").await;

    assert_eq!(geo, GeocodeResult::default());
}

#[tokio::test]
async fn service_errors_degrade_to_all_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let config = test_config(format!("{}/geocode/json", server.uri()));
    let service = GeocodeService::new(&config).unwrap();
    let geo = service.geocode_address("12 MG Road Pune").await;

    assert_eq!(geo, GeocodeResult::default());
}

#[tokio::test]
async fn empty_address_short_circuits_without_network_call() {
    let server = MockServer::start().await;
    // Nothing mounted; a request would fail the emptiness assertion below.

    let config = test_config(format!("{}/geocode/json", server.uri()));
    let service = GeocodeService::new(&config).unwrap();

    assert_eq!(service.geocode_address("").await, GeocodeResult::default());
    assert_eq!(service.geocode_address("   ").await, GeocodeResult::default());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn geocode_pass_appends_api_columns() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pune_payload()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("geocoded.csv");
    std::fs::write(
        &input,
        "Branch Name,Address\n\
         Pune Branch,12 MG Road Pune\n\
         Blank Branch,\n",
    )
    .unwrap();

    let config = test_config(format!("{}/geocode/json", server.uri()));
    run_geocode(&config, &input, &output).await.unwrap();

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "api_pincode"));
    assert!(headers.iter().any(|h| h == "api_formatted_address"));

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);

    let pin_idx = headers.iter().position(|h| h == "api_pincode").unwrap();
    let lat_idx = headers.iter().position(|h| h == "api_lat").unwrap();
    assert_eq!(rows[0].get(pin_idx), Some("411001"));
    assert_eq!(rows[0].get(lat_idx), Some("18.5204"));
    // The blank address never reached the service and stays absent.
    assert_eq!(rows[1].get(pin_idx), Some(""));
}
