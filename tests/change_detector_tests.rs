//! Polling behaviour of the change detector under a paused clock.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tarnished_weather::models::{ChangeField, WeatherSnapshot};
use tarnished_weather::services::{
    compare_snapshots, ChangeDetector, ChangeThresholds, DetectorError, ProviderKind,
    ResponseNormalizer, WeatherError,
};
use tokio::sync::mpsc;

const INTERVAL: Duration = Duration::from_secs(60);

fn fixture(name: &str) -> serde_json::Value {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
    serde_json::from_str(&text).unwrap()
}

fn normalize(payload: &serde_json::Value, kind: ProviderKind) -> WeatherSnapshot {
    ResponseNormalizer::new()
        .normalize_current_body(&payload.to_string(), kind)
        .unwrap()
}

fn snapshot(temperature_c: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        location_name: "Bergen".to_string(),
        country: Some("NO".to_string()),
        coordinates: None,
        temperature_c,
        feels_like_c: None,
        humidity: Some(80),
        pressure_hpa: None,
        wind_speed_kmh: Some(10.0),
        wind_direction_deg: None,
        cloud_cover: None,
        precipitation_mm: None,
        precipitation_probability: Some(10.0),
        condition: Some("Overcast".to_string()),
        icon: None,
        observed_at: Utc::now(),
        is_fallback: false,
    }
}

/// Fetch function replaying `script`, repeating the last entry once drained.
fn scripted(
    script: Vec<Result<WeatherSnapshot, WeatherError>>,
    calls: Arc<AtomicUsize>,
) -> impl Fn() -> std::future::Ready<Result<WeatherSnapshot, WeatherError>> + Send + Sync + 'static {
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let mut script = script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        };
        std::future::ready(next)
    }
}

#[tokio::test(start_paused = true)]
async fn test_alert_is_sent_when_threshold_is_crossed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = scripted(
        vec![Ok(snapshot(12.0)), Ok(snapshot(13.0)), Ok(snapshot(17.5))],
        Arc::clone(&calls),
    );
    let (tx, mut rx) = mpsc::channel(4);

    let detector = ChangeDetector::new(ChangeThresholds::default());
    detector.start(fetch, INTERVAL, tx).await.unwrap();
    assert!(detector.is_monitoring());
    assert_eq!(detector.baseline().unwrap().temperature_c, 12.0);

    let alert = tokio::time::timeout(INTERVAL * 5, rx.recv())
        .await
        .expect("alert within five intervals")
        .expect("channel open");

    assert_eq!(alert.location_name, "Bergen");
    assert_eq!(alert.report.entries.len(), 1);
    assert!(alert.report.contains(ChangeField::Temperature));
    assert_eq!(alert.report.entries[0].magnitude, 4.5);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    detector.stop();
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_waits_one_interval() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = scripted(vec![Ok(snapshot(12.0))], Arc::clone(&calls));
    let (tx, _rx) = mpsc::channel(4);

    let detector = ChangeDetector::new(ChangeThresholds::default());
    detector.start(fetch, INTERVAL, tx).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "seeded immediately");

    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_ticks_keep_the_baseline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = scripted(
        vec![
            Ok(snapshot(12.0)),
            Err(WeatherError::Timeout { attempts: 1 }),
            Ok(snapshot(15.0)),
        ],
        Arc::clone(&calls),
    );
    let (tx, mut rx) = mpsc::channel(4);

    let detector = ChangeDetector::new(ChangeThresholds::default());
    detector.start(fetch, INTERVAL, tx).await.unwrap();

    let alert = tokio::time::timeout(INTERVAL * 5, rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.report.entries[0].magnitude, 3.0);
    assert_eq!(detector.baseline().unwrap().temperature_c, 15.0);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = ChangeDetector::new(ChangeThresholds::default());
    let (tx, _rx) = mpsc::channel(4);

    detector
        .start(scripted(vec![Ok(snapshot(12.0))], Arc::clone(&calls)), INTERVAL, tx.clone())
        .await
        .unwrap();
    let second = detector
        .start(scripted(vec![Ok(snapshot(12.0))], Arc::clone(&calls)), INTERVAL, tx)
        .await;

    assert!(matches!(second, Err(DetectorError::AlreadyMonitoring)));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "rejected start does not fetch");
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_polling_and_allows_restart() {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = ChangeDetector::new(ChangeThresholds::default());
    let (tx, _rx) = mpsc::channel(4);

    detector
        .start(scripted(vec![Ok(snapshot(12.0))], Arc::clone(&calls)), INTERVAL, tx.clone())
        .await
        .unwrap();
    detector.stop();
    detector.stop();
    assert!(!detector.is_monitoring());
    assert!(detector.baseline().is_none());

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    detector
        .start(scripted(vec![Ok(snapshot(20.0))], Arc::clone(&calls)), INTERVAL, tx)
        .await
        .unwrap();
    assert_eq!(detector.baseline().unwrap().temperature_c, 20.0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_polling() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, _rx) = mpsc::channel(4);
    {
        let detector = ChangeDetector::new(ChangeThresholds::default());
        detector
            .start(scripted(vec![Ok(snapshot(12.0))], Arc::clone(&calls)), INTERVAL, tx)
            .await
            .unwrap();
    }

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rain_onset_from_provider_payloads_is_reported() {
    let thresholds = ChangeThresholds::default();

    // OpenWeatherMap omits `rain` entirely while dry.
    let dry = fixture("openweathermap_current.json");
    let mut wet = dry.clone();
    wet["rain"] = serde_json::json!({ "1h": 12.0 });
    let report = compare_snapshots(
        &normalize(&dry, ProviderKind::OpenWeatherMap),
        &normalize(&wet, ProviderKind::OpenWeatherMap),
        &thresholds,
    );
    assert_eq!(report.entries.len(), 1);
    assert!(report.contains(ChangeField::PrecipitationAmount));
    assert_eq!(report.entries[0].magnitude, 12.0);

    // WeatherAPI current conditions carry an amount but no probability.
    let dry = fixture("weatherapi_current.json");
    let mut drizzle = dry.clone();
    drizzle["current"]["precip_mm"] = serde_json::json!(0.4);
    assert!(compare_snapshots(
        &normalize(&dry, ProviderKind::WeatherApi),
        &normalize(&drizzle, ProviderKind::WeatherApi),
        &thresholds,
    )
    .is_empty());

    let mut downpour = dry.clone();
    downpour["current"]["precip_mm"] = serde_json::json!(6.0);
    let detector = ChangeDetector::new(thresholds);
    assert!(detector.observe(normalize(&dry, ProviderKind::WeatherApi)).is_none());
    let alert = detector
        .observe(normalize(&downpour, ProviderKind::WeatherApi))
        .unwrap();
    assert!(alert.report.contains(ChangeField::PrecipitationAmount));
}
