//! Request executor against a mock upstream.

use prometheus::Registry;
use std::time::{Duration, Instant};
use tarnished_weather::services::{
    ExecutorError, ExecutorMetrics, RequestExecutor, RequestSpec, RetryPolicy,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        ..RetryPolicy::default()
    }
}

#[tokio::test]
async fn test_success_returns_body_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri())).param("q", "London");
    let response = executor.execute(&spec, &fast_policy(2)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"ok":true}"#);
    assert_eq!(response.attempts, 1);
}

#[tokio::test]
async fn test_not_found_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"city not found"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri()));
    let failure = executor.execute(&spec, &fast_policy(3)).await.unwrap_err();

    assert_eq!(failure.attempts, 1);
    match failure.error {
        ExecutorError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("city not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri()));
    let failure = executor.execute(&spec, &fast_policy(2)).await.unwrap_err();

    assert_eq!(failure.attempts, 3);
    assert!(matches!(failure.error, ExecutorError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri()));
    let response = executor.execute(&spec, &fast_policy(2)).await.unwrap();

    assert_eq!(response.attempts, 2);
}

#[tokio::test]
async fn test_deadline_aborts_slow_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri()))
        .timeout(Duration::from_millis(200));

    let started = Instant::now();
    let failure = executor.execute(&spec, &fast_policy(2)).await.unwrap_err();

    assert!(matches!(failure.error, ExecutorError::Timeout(_)));
    assert_eq!(failure.attempts, 1, "timeouts are terminal by default");
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_timeout_retries_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new(None).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri()))
        .timeout(Duration::from_millis(100));
    let failure = executor
        .execute(&spec, &fast_policy(1).with_timeout_retries())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, ExecutorError::Timeout(_)));
    assert_eq!(failure.attempts, 2);
}

#[tokio::test]
async fn test_non_http_schemes_are_rejected_without_io() {
    let executor = RequestExecutor::new(None).unwrap();

    for url in ["ftp://example.com/weather", "file:///etc/passwd"] {
        let failure = executor
            .execute(&RequestSpec::get(url), &fast_policy(2))
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 0);
        assert!(matches!(failure.error, ExecutorError::UnsupportedProtocol(_)));
    }

    let failure = executor
        .execute(&RequestSpec::get("not a url"), &fast_policy(2))
        .await
        .unwrap_err();
    assert!(matches!(failure.error, ExecutorError::InvalidUrl));
}

#[tokio::test]
async fn test_metrics_record_attempts_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let registry = Registry::new();
    let metrics = ExecutorMetrics::new(&registry).unwrap();
    let executor = RequestExecutor::new(Some(metrics.clone())).unwrap();
    let spec = RequestSpec::get(format!("{}/weather", server.uri()));
    let _ = executor.execute(&spec, &fast_policy(1)).await;

    let destination = "127.0.0.1";
    assert_eq!(
        metrics
            .requests_total
            .with_label_values(&[destination, "server_error"])
            .get(),
        2.0
    );
    assert_eq!(
        metrics
            .retry_attempts_total
            .with_label_values(&[destination, "http_status"])
            .get(),
        1.0
    );
}
