//! Provider, cache and geocoding configuration for the weather pipeline.

use std::env;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::services::cache::CacheTtlConfig;
use crate::services::executor::RetryPolicy;
use crate::services::geocoding::DEFAULT_GEOCODING_URL;
use crate::services::providers::{ProviderKind, ProviderSettings};

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn provider_from_env(
    prefix: &str,
    default_kind: Option<ProviderKind>,
    lang: &str,
    timeout: Duration,
) -> Option<ProviderSettings> {
    let kind = match non_empty(&format!("{prefix}WEATHER_PROVIDER")) {
        Some(value) => match value.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(error) => {
                warn!(%error, "Ignoring unknown weather provider");
                default_kind?
            }
        },
        None => default_kind?,
    };

    let base_url = non_empty(&format!("{prefix}WEATHER_API_BASE_URL"))
        .unwrap_or_else(|| kind.default_base_url().to_string());

    let mut settings = ProviderSettings::new(kind, base_url).with_timeout(timeout);
    settings.api_key = non_empty(&format!("{prefix}WEATHER_API_KEY"));
    settings.lang = lang.to_string();
    Some(settings)
}

impl CacheTtlConfig {
    /// Load cache TTLs from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = CacheTtlConfig::default();
        let secs = |name: &str, default: Duration| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            current: secs("CACHE_TTL_CURRENT_SECS", defaults.current),
            forecast: secs("CACHE_TTL_FORECAST_SECS", defaults.forecast),
            historical: secs("CACHE_TTL_HISTORY_SECS", defaults.historical),
            multi_city: secs("CACHE_TTL_MULTI_SECS", defaults.multi_city),
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_entries),
        }
    }
}

/// Everything needed to build a [`crate::services::WeatherService`].
#[derive(Clone)]
pub struct PipelineConfig {
    /// In priority order
    pub providers: Vec<ProviderSettings>,
    pub geocoding_base_url: String,
    pub geocoding_api_key: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub cache: CacheTtlConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let request_timeout = Duration::from_secs(10);
        let kind = ProviderKind::OpenWeatherMap;
        Self {
            providers: vec![
                ProviderSettings::new(kind, kind.default_base_url()).with_timeout(request_timeout),
            ],
            geocoding_base_url: DEFAULT_GEOCODING_URL.to_string(),
            geocoding_api_key: None,
            request_timeout,
            retry: RetryPolicy::default(),
            cache: CacheTtlConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let request_timeout = env::var("WEATHER_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));
        let lang = non_empty("WEATHER_LANG").unwrap_or_else(|| "en".to_string());

        let providers: Vec<ProviderSettings> = [
            provider_from_env("", Some(ProviderKind::OpenWeatherMap), &lang, request_timeout),
            provider_from_env("SECONDARY_", None, &lang, request_timeout),
        ]
        .into_iter()
        .flatten()
        .collect();

        let geocoding_api_key = non_empty("GEOCODING_API_KEY").or_else(|| {
            providers
                .iter()
                .find(|p| p.kind == ProviderKind::OpenWeatherMap)
                .and_then(|p| p.api_key.clone())
        });

        Self {
            providers,
            geocoding_base_url: non_empty("GEOCODING_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODING_URL.to_string()),
            geocoding_api_key,
            request_timeout,
            retry: RetryPolicy::from_env(),
            cache: CacheTtlConfig::from_env(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("providers", &self.providers)
            .field("geocoding_base_url", &self.geocoding_base_url)
            .field(
                "geocoding_api_key",
                &self.geocoding_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .finish()
    }
}
