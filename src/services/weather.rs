//! Weather acquisition pipeline.
//!
//! Every operation follows the same path: validate the input, look the
//! result up in the cache, and on a miss ask each configured provider in
//! priority order. A response is normalized and cached. Fallback-eligible
//! failures move on to the next provider; once every provider has failed the
//! caller gets synthesized data flagged `is_fallback`, which is never
//! cached. Terminal failures (bad input, unknown location, protocol errors)
//! are returned as errors.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::models::location::{LocationInput, LocationQuery};
use crate::models::weather::{CityMatch, ForecastSnapshot, WeatherOverview, WeatherSnapshot};
use crate::services::cache::{CacheKey, CacheOperation, CacheStore, CacheTtlConfig, CachedPayload};
use crate::services::error::WeatherError;
use crate::services::executor::{RequestExecutor, RequestSpec, RetryPolicy};
use crate::services::fallback::FallbackSynthesizer;
use crate::services::geocoding::GeocodingClient;
use crate::services::metrics::AppMetrics;
use crate::services::normalizer::{ResponseNormalizer, SchemaError};
use crate::services::providers::{adapter_for, ProviderAdapter, ProviderKind};
use crate::services::validation::{validate_days, InputValidator};

pub const DEFAULT_FORECAST_DAYS: u32 = 5;
pub const MAX_FORECAST_DAYS: u32 = 7;
pub const MAX_HISTORY_DAYS: u32 = 7;

/// Shared weather pipeline. Cheap to share behind an `Arc`; all methods take
/// `&self`.
pub struct WeatherService {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    executor: RequestExecutor,
    policy: RetryPolicy,
    validator: InputValidator,
    search_validator: InputValidator,
    normalizer: ResponseNormalizer,
    cache: CacheStore,
    ttls: CacheTtlConfig,
    geocoder: Option<GeocodingClient>,
    fallback: FallbackSynthesizer,
    metrics: Option<AppMetrics>,
}

impl WeatherService {
    /// Providers are tried in the given order.
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, executor: RequestExecutor) -> Self {
        let ttls = CacheTtlConfig::default();
        Self {
            providers,
            executor,
            policy: RetryPolicy::default(),
            validator: InputValidator::default(),
            search_validator: InputValidator::for_search(),
            normalizer: ResponseNormalizer::new(),
            cache: CacheStore::new(ttls.max_entries),
            ttls,
            geocoder: None,
            fallback: FallbackSynthesizer::new(),
            metrics: None,
        }
    }

    /// Build the full pipeline from environment configuration.
    pub fn from_config(
        config: &PipelineConfig,
        metrics: Option<AppMetrics>,
    ) -> Result<Self, reqwest::Error> {
        let executor = RequestExecutor::new(metrics.as_ref().map(|m| m.upstream.clone()))?;
        let providers = config.providers.iter().cloned().map(adapter_for).collect();
        let geocoder = GeocodingClient::new(
            executor.clone(),
            config.retry.clone(),
            &config.geocoding_base_url,
            config.geocoding_api_key.clone(),
            config.request_timeout,
        );

        let service = Self::new(providers, executor)
            .with_policy(config.retry.clone())
            .with_cache_ttls(config.cache.clone())
            .with_geocoder(geocoder);
        Ok(match metrics {
            Some(metrics) => service.with_metrics(metrics),
            None => service,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the cache with an empty one bounded by `ttls.max_entries`.
    pub fn with_cache_ttls(mut self, ttls: CacheTtlConfig) -> Self {
        self.cache = CacheStore::new(ttls.max_entries);
        self.ttls = ttls;
        self
    }

    pub fn with_geocoder(mut self, geocoder: GeocodingClient) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_metrics(mut self, metrics: AppMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.providers.iter().map(|p| p.kind())
    }

    /// Current conditions for a city name or coordinate pair.
    pub async fn get_current_weather(
        &self,
        input: &LocationInput,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let location = self.validator.validate_location(input)?;
        self.current_for(&location).await
    }

    /// Daily forecast, `days` defaulting to [`DEFAULT_FORECAST_DAYS`].
    pub async fn get_forecast(
        &self,
        input: &LocationInput,
        days: Option<u32>,
    ) -> Result<ForecastSnapshot, WeatherError> {
        let days = validate_days(days.unwrap_or(DEFAULT_FORECAST_DAYS), 1, MAX_FORECAST_DAYS)?;
        let location = self.validator.validate_location(input)?;
        self.forecast_for(&location, days).await
    }

    /// The `days` full days before today for a city.
    pub async fn get_historical_weather(
        &self,
        city: &str,
        days: u32,
    ) -> Result<ForecastSnapshot, WeatherError> {
        let days = validate_days(days, 1, MAX_HISTORY_DAYS)?;
        let location = LocationQuery::City(self.validator.validate(city)?);
        let operation = CacheOperation::Historical;
        let key = CacheKey::new(operation, &location, Some(days));

        if let Some(CachedPayload::Forecast(history)) = self.cached(operation, &key) {
            return Ok(history);
        }

        let result = self
            .fetch_with_failover(
                &location,
                |adapter, target| adapter.history_request(target, days),
                |body, kind| self.normalizer.normalize_daily_body(body, kind, days),
            )
            .await;

        match result {
            Ok(history) => {
                self.store(operation, key, CachedPayload::Forecast(history.clone()));
                Ok(history)
            }
            Err(error) if error.is_fallback_eligible() => {
                self.note_fallback(operation, &location, &error);
                Ok(self.fallback.synthesize_history(&location, days))
            }
            Err(error) => Err(error),
        }
    }

    /// Place-name suggestions for search-as-you-type.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, WeatherError> {
        let name = self.search_validator.validate(query)?;
        let geocoder = self.geocoder.as_ref().ok_or(WeatherError::Upstream {
            status: None,
            attempts: 0,
        })?;
        geocoder.search(&name).await
    }

    /// Current conditions for several locations at once.
    ///
    /// Each branch validates, caches and falls back on its own; one failing
    /// branch never affects the others. Results keep the input order.
    pub async fn get_weather_for_cities(
        &self,
        inputs: &[LocationInput],
    ) -> Vec<Result<WeatherSnapshot, WeatherError>> {
        let validated: Vec<Result<LocationQuery, WeatherError>> = inputs
            .iter()
            .map(|input| self.validator.validate_location(input).map_err(WeatherError::from))
            .collect();

        // The batch is only cacheable when every input is valid.
        let locations: Option<Vec<LocationQuery>> =
            validated.iter().map(|r| r.as_ref().ok().cloned()).collect();
        let batch = locations.filter(|l| !l.is_empty()).map(|locations| {
            let mut identities: Vec<String> = locations.iter().map(LocationQuery::identity).collect();
            identities.sort();
            identities.dedup();
            (CacheKey::for_locations(&locations), identities, locations)
        });

        if let Some((key, identities, locations)) = &batch {
            if let Some(CachedPayload::MultiCity(snapshots)) =
                self.cached(CacheOperation::MultiCity, key)
            {
                let results: Option<Vec<WeatherSnapshot>> = locations
                    .iter()
                    .map(|location| {
                        identities
                            .binary_search(&location.identity())
                            .ok()
                            .and_then(|i| snapshots.get(i).cloned())
                    })
                    .collect();
                if let Some(results) = results {
                    return results.into_iter().map(Ok).collect();
                }
            }
        }

        let results: Vec<Result<WeatherSnapshot, WeatherError>> =
            join_all(validated.into_iter().map(|location| async move {
                match location {
                    Ok(location) => self.current_for(&location).await,
                    Err(error) => Err(error),
                }
            }))
            .await;

        if let Some((key, identities, locations)) = batch {
            let all_real = results
                .iter()
                .all(|r| r.as_ref().is_ok_and(|snapshot| !snapshot.is_fallback));
            if all_real {
                let mut by_identity: Vec<Option<WeatherSnapshot>> = vec![None; identities.len()];
                for (location, result) in locations.iter().zip(&results) {
                    if let (Ok(index), Ok(snapshot)) =
                        (identities.binary_search(&location.identity()), result)
                    {
                        by_identity[index] = Some(snapshot.clone());
                    }
                }
                if let Some(snapshots) = by_identity.into_iter().collect::<Option<Vec<_>>>() {
                    self.store(CacheOperation::MultiCity, key, CachedPayload::MultiCity(snapshots));
                }
            }
        }

        results
    }

    /// Current conditions plus forecast, fetched concurrently. A terminal
    /// forecast failure leaves `forecast` empty instead of failing the call.
    pub async fn get_overview(&self, input: &LocationInput) -> Result<WeatherOverview, WeatherError> {
        let location = self.validator.validate_location(input)?;
        let (current, forecast) = tokio::join!(
            self.current_for(&location),
            self.forecast_for(&location, DEFAULT_FORECAST_DAYS)
        );

        let forecast = match forecast {
            Ok(forecast) => Some(forecast),
            Err(error) => {
                warn!(
                    target: "weather_pipeline",
                    location = %location.label(),
                    error = %error,
                    "Forecast unavailable, returning current conditions only"
                );
                None
            }
        };

        Ok(WeatherOverview {
            current: current?,
            forecast,
        })
    }

    async fn current_for(&self, location: &LocationQuery) -> Result<WeatherSnapshot, WeatherError> {
        let operation = CacheOperation::Current;
        let key = CacheKey::new(operation, location, None);

        if let Some(CachedPayload::Current(snapshot)) = self.cached(operation, &key) {
            return Ok(snapshot);
        }

        let result = self
            .fetch_with_failover(
                location,
                |adapter, target| Some(adapter.current_request(target)),
                |body, kind| self.normalizer.normalize_current_body(body, kind),
            )
            .await;

        match result {
            Ok(snapshot) => {
                self.store(operation, key, CachedPayload::Current(snapshot.clone()));
                Ok(snapshot)
            }
            Err(error) if error.is_fallback_eligible() => {
                self.note_fallback(operation, location, &error);
                Ok(self.fallback.synthesize(location))
            }
            Err(error) => Err(error),
        }
    }

    async fn forecast_for(
        &self,
        location: &LocationQuery,
        days: u32,
    ) -> Result<ForecastSnapshot, WeatherError> {
        let operation = CacheOperation::Forecast;
        let key = CacheKey::new(operation, location, Some(days));

        if let Some(CachedPayload::Forecast(forecast)) = self.cached(operation, &key) {
            return Ok(forecast);
        }

        let result = self
            .fetch_with_failover(
                location,
                |adapter, target| Some(adapter.forecast_request(target, days)),
                |body, kind| self.normalizer.normalize_daily_body(body, kind, days),
            )
            .await;

        match result {
            Ok(forecast) => {
                self.store(operation, key, CachedPayload::Forecast(forecast.clone()));
                Ok(forecast)
            }
            Err(error) if error.is_fallback_eligible() => {
                self.note_fallback(operation, location, &error);
                Ok(self.fallback.synthesize_forecast(location, days))
            }
            Err(error) => Err(error),
        }
    }

    /// Try each provider in turn. Returns the first normalized result, the
    /// first terminal error, or the last fallback-eligible error.
    async fn fetch_with_failover<T, R, N>(
        &self,
        location: &LocationQuery,
        request: R,
        normalize: N,
    ) -> Result<T, WeatherError>
    where
        R: Fn(&dyn ProviderAdapter, &LocationQuery) -> Option<RequestSpec>,
        N: Fn(&str, ProviderKind) -> Result<T, SchemaError>,
    {
        let mut last_error = WeatherError::Upstream {
            status: None,
            attempts: 0,
        };

        for adapter in &self.providers {
            let adapter = adapter.as_ref();
            let provider = adapter.kind();

            let target = match self.provider_location(adapter, location).await {
                Ok(target) => target,
                Err(error) if error.is_fallback_eligible() => {
                    last_error = error;
                    continue;
                }
                Err(error) => return Err(error),
            };

            let Some(spec) = request(adapter, &target) else {
                debug!(target: "weather_pipeline", %provider, "Provider does not support this operation");
                continue;
            };

            let result = match self.executor.execute(&spec, &self.policy).await {
                Ok(response) => normalize(&response.body, provider).map_err(WeatherError::from),
                Err(failure) => Err(WeatherError::from_executor(failure, |status, body| {
                    adapter.is_not_found(status, body)
                })),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(error) if error.is_fallback_eligible() => {
                    warn!(
                        target: "weather_pipeline",
                        %provider,
                        error = %error,
                        "Provider failed, trying next"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failover(provider.as_str());
                    }
                    last_error = error;
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error)
    }

    /// Geocode city queries for providers that only take coordinates.
    async fn provider_location(
        &self,
        adapter: &dyn ProviderAdapter,
        location: &LocationQuery,
    ) -> Result<LocationQuery, WeatherError> {
        match location {
            LocationQuery::City(name) if adapter.requires_coordinates() => {
                let geocoder = self.geocoder.as_ref().ok_or(WeatherError::Upstream {
                    status: None,
                    attempts: 0,
                })?;
                let place = geocoder.resolve(name).await?;
                debug!(
                    target: "weather_pipeline",
                    provider = %adapter.kind(),
                    coordinates = %place.coordinates,
                    "Resolved city for coordinate-only provider"
                );
                Ok(LocationQuery::Coordinates(place.coordinates))
            }
            other => Ok(other.clone()),
        }
    }

    fn cached(&self, operation: CacheOperation, key: &CacheKey) -> Option<CachedPayload> {
        let value = self.cache.get(key);
        debug!(target: "weather_pipeline", key = %key, hit = value.is_some(), "Cache lookup");
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(operation, value.is_some());
        }
        value
    }

    fn store(&self, operation: CacheOperation, key: CacheKey, value: CachedPayload) {
        let ttl: Duration = self.ttls.ttl_for(operation);
        info!(target: "weather_pipeline", key = %key, ttl_secs = ttl.as_secs(), "Caching result");
        self.cache.set(key, value, ttl);
    }

    fn note_fallback(&self, operation: CacheOperation, location: &LocationQuery, error: &WeatherError) {
        warn!(
            target: "weather_pipeline",
            operation = operation.as_str(),
            location = %location.label(),
            error = %error,
            "All providers failed, serving synthesized data"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_fallback(operation);
        }
    }
}
