//! Maps provider payloads into canonical snapshots.
//!
//! Dispatch is by [`ProviderKind`]: every provider has a typed schema in
//! `providers::*` and the first field path that yields a value wins. The
//! helpers here enforce the canonical units and vocabulary (Celsius and
//! km/h to one decimal, whole-number percentages, OpenWeatherMap icon codes).

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

use crate::models::weather::{ConditionFamily, DailyConditions, ForecastSnapshot, WeatherSnapshot};
use crate::services::providers::{internal, openweathermap, weatherapi, ProviderKind};

/// Used when a payload names a place but carries no temperature at all.
pub const DEFAULT_TEMPERATURE_C: f64 = 15.0;
/// Used when a payload carries a temperature but no place name.
pub const DEFAULT_LOCATION_NAME: &str = "Unknown location";

/// Payload could not be mapped into the canonical model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("payload is not valid JSON")]
    InvalidJson,

    #[error("payload does not match the {provider} schema: {detail}")]
    Mismatch { provider: ProviderKind, detail: String },

    #[error("payload carries neither a location name nor a temperature")]
    Unusable,
}

/// Stateless dispatcher over provider schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw response body and map it as current conditions.
    pub fn normalize_current_body(
        &self,
        body: &str,
        kind: ProviderKind,
    ) -> Result<WeatherSnapshot, SchemaError> {
        let payload: Value = serde_json::from_str(body).map_err(|_| SchemaError::InvalidJson)?;
        self.normalize_current(&payload, kind)
    }

    pub fn normalize_current(
        &self,
        payload: &Value,
        kind: ProviderKind,
    ) -> Result<WeatherSnapshot, SchemaError> {
        let fields = match kind {
            ProviderKind::OpenWeatherMap => openweathermap::current_fields(parse(payload, kind)?),
            ProviderKind::WeatherApi => weatherapi::current_fields(parse(payload, kind)?),
            ProviderKind::Internal => internal::current_fields(parse(payload, kind)?),
        };
        fields.into_snapshot(kind)
    }

    /// Parse a raw response body and map it as a multi-day series.
    pub fn normalize_daily_body(
        &self,
        body: &str,
        kind: ProviderKind,
        days: u32,
    ) -> Result<ForecastSnapshot, SchemaError> {
        let payload: Value = serde_json::from_str(body).map_err(|_| SchemaError::InvalidJson)?;
        self.normalize_daily(&payload, kind, days)
    }

    /// Map a forecast or history payload, keeping at most `days` entries in
    /// date order.
    pub fn normalize_daily(
        &self,
        payload: &Value,
        kind: ProviderKind,
        days: u32,
    ) -> Result<ForecastSnapshot, SchemaError> {
        let mut snapshot = match kind {
            ProviderKind::OpenWeatherMap => openweathermap::daily_snapshot(parse(payload, kind)?),
            ProviderKind::WeatherApi => weatherapi::daily_snapshot(parse(payload, kind)?),
            ProviderKind::Internal => internal::daily_snapshot(parse(payload, kind)?),
        };
        snapshot.days.sort_by_key(|day| day.date);
        snapshot.days.dedup_by_key(|day| day.date);
        snapshot.days.truncate(days as usize);
        Ok(snapshot)
    }
}

fn parse<T: DeserializeOwned>(payload: &Value, kind: ProviderKind) -> Result<T, SchemaError> {
    T::deserialize(payload).map_err(|e| SchemaError::Mismatch {
        provider: kind,
        detail: e.to_string(),
    })
}

/// Provider-independent view of current conditions before defaults apply.
#[derive(Debug, Default)]
pub(crate) struct CurrentFields {
    pub location_name: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub temperature_c: Option<f64>,
    pub feels_like_c: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub condition: Option<String>,
    pub icon: Option<String>,
    pub is_day: Option<bool>,
    pub observed_at: Option<i64>,
}

impl CurrentFields {
    fn into_snapshot(self, kind: ProviderKind) -> Result<WeatherSnapshot, SchemaError> {
        let location_name = self.location_name.filter(|name| !name.trim().is_empty());
        let (location_name, temperature_c) = match (location_name, self.temperature_c) {
            (None, None) => return Err(SchemaError::Unusable),
            (Some(name), Some(temp)) => (name, temp),
            (Some(name), None) => {
                warn!(
                    target: "weather_pipeline",
                    provider = %kind,
                    "Payload has no temperature, using placeholder"
                );
                (name, DEFAULT_TEMPERATURE_C)
            }
            (None, Some(temp)) => (DEFAULT_LOCATION_NAME.to_string(), temp),
        };

        let precipitation_mm = self.precipitation_mm.map(round1);
        let cloud_cover = self.cloud_cover.map(percent);
        let (condition, icon) = resolve_condition(
            self.condition.as_deref(),
            self.icon.as_deref(),
            cloud_cover,
            precipitation_mm,
            self.is_day.unwrap_or(true),
        );

        Ok(WeatherSnapshot {
            location_name: location_name.trim().to_string(),
            country: self.country.filter(|c| !c.is_empty()),
            coordinates: coordinates(self.lat, self.lon),
            temperature_c: round1(temperature_c),
            feels_like_c: self.feels_like_c.map(round1),
            humidity: self.humidity.map(percent),
            pressure_hpa: self.pressure_hpa.map(pressure),
            wind_speed_kmh: self.wind_speed_kmh.map(round1),
            wind_direction_deg: self.wind_direction_deg.map(direction),
            cloud_cover,
            precipitation_mm,
            precipitation_probability: self.precipitation_probability.map(|p| percent(p) as f64),
            condition,
            icon,
            observed_at: timestamp(self.observed_at),
            is_fallback: false,
        })
    }
}

/// Provider-independent view of one day before units are fixed.
#[derive(Debug, Default)]
pub(crate) struct DailyFields {
    pub date: Option<NaiveDate>,
    pub temperature_min_c: Option<f64>,
    pub temperature_max_c: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub condition: Option<String>,
    pub icon: Option<String>,
}

impl DailyFields {
    /// `None` when the entry has no usable date.
    pub(crate) fn into_daily(self) -> Option<DailyConditions> {
        let date = self.date?;
        let precipitation_mm = self.precipitation_mm.map(round1);
        let (condition, icon) = resolve_condition(
            self.condition.as_deref(),
            self.icon.as_deref(),
            None,
            precipitation_mm,
            true,
        );
        Some(DailyConditions {
            date,
            temperature_min_c: self.temperature_min_c.map(round1),
            temperature_max_c: self.temperature_max_c.map(round1),
            humidity: self.humidity.map(percent),
            precipitation_probability: self.precipitation_probability.map(|p| percent(p) as f64),
            precipitation_mm,
            wind_speed_kmh: self.wind_speed_kmh.map(round1),
            condition,
            icon,
        })
    }
}

/// `YYYY-MM-DD`; anything else is dropped.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

pub(crate) fn pressure(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

pub(crate) fn direction(value: f64) -> u16 {
    (value.rem_euclid(360.0).round() as u16) % 360
}

/// Metres per second to kilometres per hour.
pub(crate) fn ms_to_kmh(value: f64) -> f64 {
    value * 3.6
}

pub(crate) fn coordinates(
    lat: Option<f64>,
    lon: Option<f64>,
) -> Option<crate::models::location::Coordinates> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => crate::models::location::Coordinates::new(lat, lon).ok(),
        _ => None,
    }
}

pub(crate) fn timestamp(epoch: Option<i64>) -> DateTime<Utc> {
    epoch
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Trim, lowercase, then capitalize the first letter: "LIGHT RAIN" becomes
/// "Light rain".
pub(crate) fn canonical_condition(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    let mut chars = lowered.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

static OWM_ICON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}[dn]$").expect("icon pattern compiles"));

/// Resolve condition text and icon code.
///
/// Text comes from the provider when present, otherwise from precipitation
/// and cloud cover. Icons already in the canonical vocabulary are kept;
/// anything else is derived from the condition family.
pub(crate) fn resolve_condition(
    text: Option<&str>,
    icon: Option<&str>,
    cloud_cover: Option<u8>,
    precipitation_mm: Option<f64>,
    is_day: bool,
) -> (Option<String>, Option<String>) {
    let condition = text
        .and_then(canonical_condition)
        .or_else(|| derive_condition(cloud_cover, precipitation_mm).map(str::to_string));

    let icon = match icon.map(str::trim) {
        Some(code) if OWM_ICON.is_match(code) => Some(code.to_string()),
        _ => condition
            .as_deref()
            .map(|c| ConditionFamily::from_description(c).icon_code(is_day)),
    };

    (condition, icon)
}

fn derive_condition(cloud_cover: Option<u8>, precipitation_mm: Option<f64>) -> Option<&'static str> {
    if precipitation_mm.is_some_and(|mm| mm > 0.0) {
        return Some("Rain");
    }
    match cloud_cover? {
        c if c > 50 => Some("Cloudy"),
        c if c > 20 => Some("Partly cloudy"),
        _ => Some("Clear"),
    }
}
