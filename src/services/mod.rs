//! The weather acquisition pipeline and its components.
//!
//! Validation, request execution, caching, normalization, fallback
//! synthesis and change detection are separate modules;
//! [`weather::WeatherService`] wires them together.

pub mod cache;
pub mod change_detector;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod geocoding;
pub mod metrics;
pub mod normalizer;
pub mod providers;
pub mod validation;
pub mod weather;

pub use cache::{CacheKey, CacheOperation, CacheStore, CacheTtlConfig, CachedPayload};
pub use change_detector::{compare_snapshots, ChangeDetector, ChangeThresholds, DetectorError};
pub use error::{FailureOutcome, WeatherError};
pub use executor::{
    ExecutorError, ExecutorFailure, ExecutorMetrics, ExecutorResponse, RequestExecutor,
    RequestSpec, RetryDecision, RetryPolicy,
};
pub use fallback::FallbackSynthesizer;
pub use geocoding::GeocodingClient;
pub use metrics::AppMetrics;
pub use normalizer::{ResponseNormalizer, SchemaError};
pub use providers::{adapter_for, ProviderAdapter, ProviderKind, ProviderSettings};
pub use validation::{InputValidator, ValidationError};
pub use weather::WeatherService;
