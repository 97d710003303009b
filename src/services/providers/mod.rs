//! Upstream weather providers.
//!
//! Each provider kind has one adapter that knows its URL shape, and one
//! schema module that maps its payloads into the canonical snapshots. The
//! normalizer dispatches on [`ProviderKind`] instead of probing fields.

pub mod internal;
pub mod openweathermap;
pub mod weatherapi;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::models::location::LocationQuery;
use crate::services::executor::RequestSpec;

pub use internal::InternalAdapter;
pub use openweathermap::OpenWeatherMapAdapter;
pub use weatherapi::WeatherApiAdapter;

/// Supported upstream schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `main.temp`, `weather[0].description`, `wind.speed`
    OpenWeatherMap,
    /// `current.temp_c`, `current.condition.text`
    WeatherApi,
    /// `current` block plus top-level `coord`
    Internal,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenWeatherMap => "openweathermap",
            ProviderKind::WeatherApi => "weatherapi",
            ProviderKind::Internal => "internal",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenWeatherMap => "https://api.openweathermap.org/data/2.5",
            ProviderKind::WeatherApi => "https://api.weatherapi.com/v1",
            ProviderKind::Internal => "http://127.0.0.1:9090/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider kind: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openweathermap" | "owm" => Ok(ProviderKind::OpenWeatherMap),
            "weatherapi" => Ok(ProviderKind::WeatherApi),
            "internal" => Ok(ProviderKind::Internal),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Connection settings for one provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub lang: String,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            api_key: None,
            lang: "en".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> RequestSpec {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        RequestSpec::get(url).timeout(self.timeout)
    }
}

// Keep API keys out of Debug output.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("lang", &self.lang)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Knows one upstream's URL shape and error conventions.
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Providers that only accept coordinates get geocoded queries.
    fn requires_coordinates(&self) -> bool {
        false
    }

    fn current_request(&self, location: &LocationQuery) -> RequestSpec;

    fn forecast_request(&self, location: &LocationQuery, days: u32) -> RequestSpec;

    /// `None` when the provider has no historical data.
    fn history_request(&self, location: &LocationQuery, days: u32) -> Option<RequestSpec>;

    /// Whether a non-success response means "unknown location".
    fn is_not_found(&self, status: u16, _body: &str) -> bool {
        status == 404
    }
}

/// Build the adapter for a provider's settings.
pub fn adapter_for(settings: ProviderSettings) -> Arc<dyn ProviderAdapter> {
    match settings.kind {
        ProviderKind::OpenWeatherMap => Arc::new(OpenWeatherMapAdapter::new(settings)),
        ProviderKind::WeatherApi => Arc::new(WeatherApiAdapter::new(settings)),
        ProviderKind::Internal => Arc::new(InternalAdapter::new(settings)),
    }
}
