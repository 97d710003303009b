//! End-to-end pipeline behaviour against mock providers.

use std::time::Duration;
use tarnished_weather::models::LocationInput;
use tarnished_weather::services::{
    adapter_for, GeocodingClient, ProviderKind, ProviderSettings, RequestExecutor, RetryPolicy,
    WeatherError, WeatherService,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        ..RetryPolicy::default()
    }
}

fn settings(kind: ProviderKind, server: &MockServer) -> ProviderSettings {
    ProviderSettings::new(kind, server.uri())
        .with_api_key("test-key")
        .with_timeout(Duration::from_millis(300))
}

fn service(providers: Vec<ProviderSettings>) -> WeatherService {
    let executor = RequestExecutor::new(None).unwrap();
    WeatherService::new(providers.into_iter().map(adapter_for).collect(), executor)
        .with_policy(fast_policy())
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn test_transient_failures_are_retried_then_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "London"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("openweathermap_current.json")))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let location = LocationInput::name("London");

    let first = service.get_current_weather(&location).await.unwrap();
    assert!(!first.is_fallback);
    assert_eq!(first.temperature_c, 22.0);
    assert_eq!(request_count(&server).await, 3);

    // Same identity, different formatting: served from cache.
    let second = service
        .get_current_weather(&LocationInput::name("  LONDON "))
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_exhausted_provider_degrades_without_caching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let location = LocationInput::name("Paris");

    let snapshot = service.get_current_weather(&location).await.unwrap();
    assert!(snapshot.is_fallback);
    assert_eq!(snapshot.location_name, "Paris");
    assert!(service.cache().is_empty());
    assert_eq!(request_count(&server).await, 3);

    // Nothing was cached, so the next call asks the provider again.
    let again = service.get_current_weather(&location).await.unwrap();
    assert!(again.is_fallback);
    assert_eq!(request_count(&server).await, 6);
}

#[tokio::test]
async fn test_unknown_city_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"cod":"404","message":"city not found"}"#),
        )
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let error = service
        .get_current_weather(&LocationInput::name("Atlantis"))
        .await
        .unwrap_err();

    assert_eq!(error, WeatherError::NotFound);
    assert_eq!(error.user_message(), "City not found.");
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_weatherapi_unknown_location_code_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":{"code":1006,"message":"No matching location found."}}"#,
        ))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::WeatherApi, &server)]);
    let error = service
        .get_current_weather(&LocationInput::name("Atlantis"))
        .await
        .unwrap_err();
    assert_eq!(error, WeatherError::NotFound);
}

#[tokio::test]
async fn test_slow_primary_fails_over_to_secondary() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(fixture("openweathermap_current.json"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&primary)
        .await;

    let secondary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/current.json"))
        .and(query_param("q", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("weatherapi_current.json")))
        .mount(&secondary)
        .await;

    let service = service(vec![
        settings(ProviderKind::OpenWeatherMap, &primary),
        settings(ProviderKind::WeatherApi, &secondary),
    ]);
    let snapshot = service
        .get_current_weather(&LocationInput::name("London"))
        .await
        .unwrap();

    assert!(!snapshot.is_fallback);
    assert_eq!(snapshot.temperature_c, 22.0);
    assert_eq!(request_count(&primary).await, 1, "timeouts are not retried");
    assert_eq!(request_count(&secondary).await, 1);

    let batch = service
        .get_weather_for_cities(&[LocationInput::name("London")])
        .await;
    assert!(batch[0].as_ref().is_ok_and(|s| !s.is_fallback));
}

#[tokio::test]
async fn test_slow_lone_provider_degrades_without_caching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let snapshot = service
        .get_current_weather(&LocationInput::name("Rome"))
        .await
        .unwrap();

    assert!(snapshot.is_fallback);
    assert_eq!(request_count(&server).await, 1);
    assert!(service.cache().is_empty());

    let batch = service
        .get_weather_for_cities(&[LocationInput::name("Rome")])
        .await;
    assert!(batch[0].as_ref().is_ok_and(|s| s.is_fallback));
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_failover_to_secondary_provider() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&primary)
        .await;

    let secondary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/current.json"))
        .and(query_param("q", "London"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("weatherapi_current.json")))
        .expect(1)
        .mount(&secondary)
        .await;

    let service = service(vec![
        settings(ProviderKind::OpenWeatherMap, &primary),
        settings(ProviderKind::WeatherApi, &secondary),
    ]);
    let snapshot = service
        .get_current_weather(&LocationInput::name("London"))
        .await
        .unwrap();

    assert!(!snapshot.is_fallback);
    assert_eq!(snapshot.location_name, "London");
    assert_eq!(snapshot.condition.as_deref(), Some("Clear sky"));
}

#[tokio::test]
async fn test_malformed_payload_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let snapshot = service
        .get_current_weather(&LocationInput::coordinates(48.85, 2.35))
        .await
        .unwrap();

    assert!(snapshot.is_fallback);
    assert_eq!(request_count(&server).await, 1, "schema errors are not retried");
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_coordinate_only_provider_geocodes_cities() {
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/direct"))
        .and(query_param("q", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"name":"London","lat":51.5,"lon":-0.12,"country":"GB"}]"#,
        ))
        .expect(1)
        .mount(&geo)
        .await;

    let internal = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/current"))
        .and(query_param("lat", "51.5"))
        .and(query_param("lon", "-0.12"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("internal_current.json")))
        .expect(1)
        .mount(&internal)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let geocoder = GeocodingClient::new(
        executor,
        fast_policy(),
        geo.uri(),
        Some("geo-key".to_string()),
        Duration::from_millis(300),
    );
    let service = service(vec![settings(ProviderKind::Internal, &internal)]).with_geocoder(geocoder);

    let snapshot = service
        .get_current_weather(&LocationInput::name("London"))
        .await
        .unwrap();
    assert!(!snapshot.is_fallback);
    assert_eq!(snapshot.country.as_deref(), Some("GB"));
}

#[tokio::test]
async fn test_search_cities_uses_geocoder() {
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/direct"))
        .and(query_param("q", "Spring"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"name":"Springfield","lat":39.8,"lon":-89.6,"country":"US","state":"Illinois"},
                {"name":"Springfield","lat":39.8,"lon":-89.6,"country":"US","state":"Illinois"},
                {"name":"Springfield","lat":37.2,"lon":-93.3,"country":"US","state":"Missouri"},
                {"name":"","lat":1.0,"lon":1.0}
            ]"#,
        ))
        .mount(&geo)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let geocoder = GeocodingClient::new(
        executor,
        fast_policy(),
        geo.uri(),
        None,
        Duration::from_millis(300),
    );
    let service = service(Vec::new()).with_geocoder(geocoder);

    let matches = service.search_cities("Spring").await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[1].state.as_deref(), Some("Missouri"));
}

#[tokio::test]
async fn test_forecast_is_normalized_and_cached_per_day_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("weatherapi_forecast.json")))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::WeatherApi, &server)]);
    let location = LocationInput::name("London");

    let three = service.get_forecast(&location, Some(3)).await.unwrap();
    assert_eq!(three.days.len(), 3);
    let two = service.get_forecast(&location, Some(2)).await.unwrap();
    assert_eq!(two.days.len(), 2);
    assert_eq!(request_count(&server).await, 2);

    service.get_forecast(&location, Some(3)).await.unwrap();
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_history_without_capable_provider_is_synthesized() {
    let server = MockServer::start().await;
    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);

    let history = service.get_historical_weather("Berlin", 4).await.unwrap();
    assert!(history.is_fallback);
    assert_eq!(history.days.len(), 4);
    assert!(history.days.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_batch_is_cached_only_when_every_branch_is_real() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("openweathermap_current.json")))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let cities = [LocationInput::name("London"), LocationInput::name("Leeds")];

    let first = service.get_weather_for_cities(&cities).await;
    assert!(first.iter().all(|r| r.as_ref().is_ok_and(|s| !s.is_fallback)));
    assert_eq!(request_count(&server).await, 2);

    let reversed = [LocationInput::name("leeds"), LocationInput::name("LONDON")];
    let second = service.get_weather_for_cities(&reversed).await;
    assert_eq!(second.len(), 2);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_overview_keeps_current_when_forecast_fails_terminally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("openweathermap_current.json")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = service(vec![settings(ProviderKind::OpenWeatherMap, &server)]);
    let overview = service
        .get_overview(&LocationInput::name("London"))
        .await
        .unwrap();

    assert!(!overview.current.is_fallback);
    assert!(overview.forecast.is_none());
}
