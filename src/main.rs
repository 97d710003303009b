use actix_web::HttpServer;
use paperclip::actix::web;
use std::sync::Arc;
use tarnished_weather::{
    config::bind_address,
    create_app,
    models::ChangeAlert,
    AppMetrics, ChangeDetector, ChangeMonitorConfig, LocationInput, MetricsConfig, PipelineConfig,
    WeatherService,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Install the global subscriber. `RUST_LOG` filters, `LOG_FORMAT=json`
/// switches to structured JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Start one detector per watched location. Alerts from all of them are
/// logged by a single consumer task.
async fn start_change_monitoring(
    service: web::Data<WeatherService>,
    config: &ChangeMonitorConfig,
) -> Vec<ChangeDetector> {
    if config.watch_locations.is_empty() {
        return Vec::new();
    }

    let (tx, mut rx) = mpsc::channel::<ChangeAlert>(32);
    tokio::spawn(async move {
        while let Some(alert) = rx.recv().await {
            let report = serde_json::to_string(&alert.report).unwrap_or_default();
            warn!(
                target: "weather_alert",
                location = %alert.location_name,
                detected_at = %alert.detected_at,
                report = %report,
                "Significant weather change"
            );
        }
    });

    let service: Arc<WeatherService> = service.into_inner();
    let mut detectors = Vec::with_capacity(config.watch_locations.len());
    for location in &config.watch_locations {
        let detector = ChangeDetector::new(config.thresholds);
        let service = Arc::clone(&service);
        let input = LocationInput::name(location.clone());
        let fetch = move || {
            let service = Arc::clone(&service);
            let input = input.clone();
            async move { service.get_current_weather(&input).await }
        };

        match detector.start(fetch, config.poll_interval, tx.clone()).await {
            Ok(()) => {
                info!(
                    target: "weather_alert",
                    location = %location,
                    interval_secs = config.poll_interval.as_secs(),
                    "Change monitoring started"
                );
                detectors.push(detector);
            }
            Err(e) => error!(target: "weather_alert", location = %location, error = %e, "Failed to start change monitoring"),
        }
    }
    detectors
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let pipeline_config = PipelineConfig::from_env();
    let metrics_config = MetricsConfig::from_env();
    let monitor_config = ChangeMonitorConfig::from_env();
    info!(config = ?pipeline_config, "Loaded pipeline configuration");

    let metrics = AppMetrics::new().map_err(std::io::Error::other)?;
    let service = WeatherService::from_config(&pipeline_config, Some(metrics.clone()))
        .map_err(std::io::Error::other)?;
    let service = web::Data::new(service);
    let metrics = web::Data::new(metrics);

    let detectors = start_change_monitoring(service.clone(), &monitor_config).await;

    let address = bind_address();
    info!(address = %address, "Server starting");

    let result = HttpServer::new(move || {
        create_app(service.clone(), metrics.clone(), metrics_config.clone())
    })
    .bind(&address)?
    .run()
    .await;

    for detector in &detectors {
        detector.stop();
    }
    result
}
