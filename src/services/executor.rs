//! Request executor with per-attempt deadlines and classified retries.
//!
//! This module issues one logical GET request against a provider and:
//! - Rejects anything that is not an `http://` or `https://` target
//! - Bounds every attempt with a deadline, dropping the in-flight call on expiry
//! - Classifies failures as retryable or terminal with a structured classifier
//! - Retries retryable failures with capped exponential backoff
//! - Records per-destination Prometheus metrics
//!
//! URLs carry API keys in their query strings, so only host and path are
//! ever logged.

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use reqwest::Client;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_retry::RetryIf;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

/// Whether a failed attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Terminal,
}

/// Maps an executor error to a retry decision.
pub type RetryClassifier = fn(&ExecutorError) -> RetryDecision;

/// Network errors and 5xx responses are retryable; everything else,
/// including timeouts, protocol errors and any 4xx, is terminal.
pub fn default_classifier(error: &ExecutorError) -> RetryDecision {
    match error {
        ExecutorError::Network(_) => RetryDecision::Retry,
        ExecutorError::Status { status, .. } if *status >= 500 => RetryDecision::Retry,
        _ => RetryDecision::Terminal,
    }
}

/// Same as [`default_classifier`] but also retries attempts that hit their deadline.
pub fn timeout_tolerant_classifier(error: &ExecutorError) -> RetryDecision {
    match error {
        ExecutorError::Timeout(_) => RetryDecision::Retry,
        other => default_classifier(other),
    }
}

/// Retry policy for one logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor applied per retry
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Randomize each delay within `0..delay`
    pub jitter: bool,
    pub classifier: RetryClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: false,
            classifier: default_classifier,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Switch to a classifier that treats timeouts as retryable.
    pub fn with_timeout_retries(mut self) -> Self {
        self.classifier = timeout_tolerant_classifier;
        self
    }

    /// `min(base * multiplier^retry, cap)`, `retry` counting from zero.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let delay_ms = self.base_delay.as_millis() as f64 * factor;
        let cap_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(cap_ms) as u64)
    }

    /// Unbounded delay sequence; callers `take` as many as they need.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: self.clone(),
            retry: 0,
        }
    }

    pub fn classify(&self, error: &ExecutorError) -> RetryDecision {
        (self.classifier)(error)
    }
}

/// Iterator over retry delays for a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    retry: u32,
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_for_retry(self.retry);
        self.retry = self.retry.saturating_add(1);
        if self.policy.jitter {
            Some(tokio_retry::strategy::jitter(delay))
        } else {
            Some(delay)
        }
    }
}

/// One outbound GET request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Deadline for each attempt
    pub timeout: Duration,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ExecutorResponse {
    pub status: u16,
    pub body: String,
    pub attempts: u32,
}

/// Errors from a single attempt.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("invalid request url")]
    InvalidUrl,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success status. The body is kept for classification only and is
    /// never part of the display output.
    #[error("upstream returned status {status}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(reqwest::Error),
}

/// Last error of a logical request, tagged with the number of attempts made.
#[derive(Debug, thiserror::Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct ExecutorFailure {
    #[source]
    pub error: ExecutorError,
    pub attempts: u32,
}

/// Prometheus metrics for outbound requests.
#[derive(Clone)]
pub struct ExecutorMetrics {
    /// Attempts by destination and outcome
    pub requests_total: CounterVec,
    /// Attempt duration by destination
    pub request_duration_seconds: HistogramVec,
    /// Retries by destination and reason
    pub retry_attempts_total: CounterVec,
    /// Attempts that hit their deadline, by destination
    pub timeouts_total: CounterVec,
}

impl ExecutorMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "weather_upstream_requests_total",
                "Upstream request attempts by destination and outcome",
            ),
            &["destination", "outcome"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "weather_upstream_request_duration_seconds",
                "Duration of upstream request attempts",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["destination"],
        )?;

        let retry_attempts_total = CounterVec::new(
            Opts::new(
                "weather_upstream_retry_attempts_total",
                "Upstream retries by destination and reason",
            ),
            &["destination", "reason"],
        )?;

        let timeouts_total = CounterVec::new(
            Opts::new(
                "weather_upstream_timeouts_total",
                "Upstream attempts that exceeded their deadline",
            ),
            &["destination"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(retry_attempts_total.clone()))?;
        registry.register(Box::new(timeouts_total.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            retry_attempts_total,
            timeouts_total,
        })
    }
}

/// Log and metrics context for one logical request.
#[derive(Debug, Clone)]
struct RequestContext {
    request_id: Uuid,
    destination: String,
    path: String,
}

/// Issues provider requests with deadlines and retries.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    metrics: Option<ExecutorMetrics>,
}

impl RequestExecutor {
    pub fn new(metrics: Option<ExecutorMetrics>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self { client, metrics })
    }

    /// Execute a request under `policy`, returning the first 2xx response or
    /// the last error once retries are exhausted or a terminal error occurs.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        policy: &RetryPolicy,
    ) -> Result<ExecutorResponse, ExecutorFailure> {
        let url = Url::parse(&spec.url).map_err(|_| ExecutorFailure {
            error: ExecutorError::InvalidUrl,
            attempts: 0,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            warn!(target: "http_client", scheme = url.scheme(), "Refusing non-HTTP request");
            return Err(ExecutorFailure {
                error: ExecutorError::UnsupportedProtocol(url.scheme().to_string()),
                attempts: 0,
            });
        }

        let context = RequestContext {
            request_id: Uuid::new_v4(),
            destination: url.host_str().unwrap_or("unknown").to_string(),
            path: url.path().to_string(),
        };

        let attempts = AtomicU32::new(0);
        let strategy = policy.schedule().take(policy.max_retries as usize);

        let result = RetryIf::spawn(
            strategy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                self.attempt(&url, spec, &context, attempt)
            },
            |error: &ExecutorError| {
                let retry = policy.classify(error) == RetryDecision::Retry;
                // Also consulted after the final attempt, when no retry follows.
                if retry && attempts.load(Ordering::SeqCst) <= policy.max_retries {
                    self.record_retry(&context, error);
                }
                retry
            },
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(response) => {
                if attempts > 1 {
                    info!(
                        target: "http_client",
                        request_id = %context.request_id,
                        destination = %context.destination,
                        attempts,
                        "Request succeeded after retries"
                    );
                }
                Ok(ExecutorResponse { attempts, ..response })
            }
            Err(error) => {
                error!(
                    target: "http_client",
                    request_id = %context.request_id,
                    destination = %context.destination,
                    path = %context.path,
                    attempts,
                    error = %error,
                    "Request failed"
                );
                Err(ExecutorFailure { error, attempts })
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        spec: &RequestSpec,
        context: &RequestContext,
        attempt: u32,
    ) -> Result<ExecutorResponse, ExecutorError> {
        let start = Instant::now();
        let send = async {
            let response = self
                .client
                .get(url.clone())
                .query(&spec.query)
                .timeout(spec.timeout)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        // Dropping the future on expiry cancels the in-flight call.
        let outcome = tokio::time::timeout(spec.timeout, send).await;
        let elapsed = start.elapsed();

        let result = match outcome {
            Err(_) => Err(ExecutorError::Timeout(spec.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(ExecutorError::Timeout(spec.timeout)),
            Ok(Err(e)) => Err(ExecutorError::Network(e.without_url())),
            Ok(Ok((status, body))) if (200..300).contains(&status) => Ok(ExecutorResponse {
                status,
                body,
                attempts: attempt,
            }),
            Ok(Ok((status, body))) => Err(ExecutorError::Status { status, body }),
        };

        let outcome_label = match &result {
            Ok(_) => "success",
            Err(ExecutorError::Timeout(_)) => "timeout",
            Err(ExecutorError::Network(_)) => "network_error",
            Err(ExecutorError::Status { status, .. }) if *status >= 500 => "server_error",
            Err(ExecutorError::Status { .. }) => "client_error",
            Err(_) => "error",
        };
        self.record_attempt(context, outcome_label, elapsed);

        match &result {
            Ok(response) => info!(
                target: "http_client",
                request_id = %context.request_id,
                destination = %context.destination,
                path = %context.path,
                attempt,
                status = response.status,
                duration_ms = elapsed.as_millis() as u64,
                "Request completed"
            ),
            Err(error) => warn!(
                target: "http_client",
                request_id = %context.request_id,
                destination = %context.destination,
                path = %context.path,
                attempt,
                outcome = outcome_label,
                error = %error,
                duration_ms = elapsed.as_millis() as u64,
                "Request attempt failed"
            ),
        }

        result
    }

    fn record_attempt(&self, context: &RequestContext, outcome: &str, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics
                .requests_total
                .with_label_values(&[context.destination.as_str(), outcome])
                .inc();
            metrics
                .request_duration_seconds
                .with_label_values(&[context.destination.as_str()])
                .observe(duration.as_secs_f64());
            if outcome == "timeout" {
                metrics
                    .timeouts_total
                    .with_label_values(&[context.destination.as_str()])
                    .inc();
            }
        }
    }

    fn record_retry(&self, context: &RequestContext, error: &ExecutorError) {
        if let Some(metrics) = &self.metrics {
            let reason = match error {
                ExecutorError::Timeout(_) => "timeout",
                ExecutorError::Network(_) => "network_error",
                ExecutorError::Status { .. } => "http_status",
                _ => "other",
            };
            metrics
                .retry_attempts_total
                .with_label_values(&[context.destination.as_str(), reason])
                .inc();
        }
    }
}
