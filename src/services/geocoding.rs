//! Place-name lookup against the OpenWeatherMap geocoding API.
//!
//! Used for city search and to resolve names into coordinates for providers
//! that only accept coordinates.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::location::Coordinates;
use crate::models::weather::CityMatch;
use crate::services::error::WeatherError;
use crate::services::executor::{RequestExecutor, RequestSpec, RetryPolicy};
use crate::services::normalizer::SchemaError;
use crate::services::providers::ProviderKind;

pub const DEFAULT_GEOCODING_URL: &str = "https://api.openweathermap.org/geo/1.0";
/// Matches requested per search.
pub const SEARCH_LIMIT: u32 = 5;

#[derive(Debug, Deserialize)]
struct GeoEntry {
    name: Option<String>,
    lat: f64,
    lon: f64,
    country: Option<String>,
    state: Option<String>,
}

#[derive(Clone)]
pub struct GeocodingClient {
    executor: RequestExecutor,
    policy: RetryPolicy,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl GeocodingClient {
    pub fn new(
        executor: RequestExecutor,
        policy: RetryPolicy,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            policy,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    fn request(&self, name: &str) -> RequestSpec {
        let url = format!("{}/direct", self.base_url.trim_end_matches('/'));
        let spec = RequestSpec::get(url)
            .param("q", name)
            .param("limit", SEARCH_LIMIT)
            .timeout(self.timeout);
        match &self.api_key {
            Some(key) => spec.param("appid", key),
            None => spec,
        }
    }

    /// Matches for an already validated name. No match is an empty list.
    pub async fn search(&self, name: &str) -> Result<Vec<CityMatch>, WeatherError> {
        let response = self
            .executor
            .execute(&self.request(name), &self.policy)
            .await
            .map_err(|failure| WeatherError::from_executor(failure, |status, _| status == 404))?;

        let entries: Vec<GeoEntry> =
            serde_json::from_str(&response.body).map_err(|e| SchemaError::Mismatch {
                provider: ProviderKind::OpenWeatherMap,
                detail: e.to_string(),
            })?;

        let mut matches: Vec<CityMatch> = Vec::with_capacity(entries.len());
        for entry in entries {
            let Ok(coordinates) = Coordinates::new(entry.lat, entry.lon) else {
                continue;
            };
            let Some(name) = entry.name.filter(|n| !n.trim().is_empty()) else {
                continue;
            };
            let candidate = CityMatch {
                name,
                country: entry.country,
                state: entry.state,
                coordinates,
            };
            // The API returns one row per administrative match, which can repeat.
            let duplicate = matches.iter().any(|m| {
                m.name == candidate.name && m.country == candidate.country && m.state == candidate.state
            });
            if !duplicate {
                matches.push(candidate);
            }
        }

        debug!(target: "weather_pipeline", matches = matches.len(), "Geocoding search completed");
        Ok(matches)
    }

    /// Best match for `name`; no match is [`WeatherError::NotFound`].
    pub async fn resolve(&self, name: &str) -> Result<CityMatch, WeatherError> {
        self.search(name)
            .await?
            .into_iter()
            .next()
            .ok_or(WeatherError::NotFound)
    }
}
