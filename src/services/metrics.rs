//! Prometheus metrics for the HTTP surface and the weather pipeline.

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::{Duration, Instant};

use crate::services::cache::CacheOperation;
use crate::services::executor::ExecutorMetrics;

/// Application metrics collector for Prometheus integration
#[derive(Clone)]
pub struct AppMetrics {
    pub registry: Registry,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    /// Outbound provider requests, shared with the executor
    pub upstream: ExecutorMetrics,
    pub cache_lookups_total: CounterVec,
    pub fallbacks_total: CounterVec,
    pub provider_failovers_total: CounterVec,
    pub app_uptime_seconds: Gauge,
    pub app_info: CounterVec,
    pub start_time: Instant,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status", "route"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )?;

        let cache_lookups_total = CounterVec::new(
            Opts::new(
                "weather_cache_lookups_total",
                "Cache lookups by operation and result",
            ),
            &["operation", "result"],
        )?;

        let fallbacks_total = CounterVec::new(
            Opts::new(
                "weather_fallbacks_total",
                "Synthesized responses served because every provider failed",
            ),
            &["operation"],
        )?;

        let provider_failovers_total = CounterVec::new(
            Opts::new(
                "weather_provider_failovers_total",
                "Provider failures that moved the request to the next provider",
            ),
            &["provider"],
        )?;

        let app_uptime_seconds = Gauge::new("app_uptime_seconds", "Application uptime in seconds")?;

        let app_info = CounterVec::new(
            Opts::new("app_info", "Application information"),
            &["version", "commit", "build_time"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(fallbacks_total.clone()))?;
        registry.register(Box::new(provider_failovers_total.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;
        registry.register(Box::new(app_info.clone()))?;
        let upstream = ExecutorMetrics::new(&registry)?;

        app_info
            .with_label_values(&[
                env!("CARGO_PKG_VERSION"),
                option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
                option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
            ])
            .inc();

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            upstream,
            cache_lookups_total,
            fallbacks_total,
            provider_failovers_total,
            app_uptime_seconds,
            app_info,
            start_time: Instant::now(),
        })
    }

    /// Record an HTTP request with method, route, status, and duration
    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        if route == "/api/metrics" {
            return;
        }

        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, status.as_str(), route])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    pub fn record_cache_lookup(&self, operation: CacheOperation, hit: bool) {
        self.cache_lookups_total
            .with_label_values(&[operation.as_str(), if hit { "hit" } else { "miss" }])
            .inc();
    }

    pub fn record_fallback(&self, operation: CacheOperation) {
        self.fallbacks_total
            .with_label_values(&[operation.as_str()])
            .inc();
    }

    pub fn record_failover(&self, provider: &str) {
        self.provider_failovers_total
            .with_label_values(&[provider])
            .inc();
    }

    pub fn update_uptime(&self) {
        self.app_uptime_seconds
            .set(self.start_time.elapsed().as_secs_f64());
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }
}
