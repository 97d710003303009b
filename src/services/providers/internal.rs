//! Adapter for the in-house weather service.
//!
//! The service only accepts coordinates; city queries are geocoded before
//! they reach this adapter. Field names changed between versions, so the
//! schema accepts both spellings.

use chrono::Utc;
use serde::Deserialize;

use super::{ProviderAdapter, ProviderKind, ProviderSettings};
use crate::models::location::LocationQuery;
use crate::models::weather::ForecastSnapshot;
use crate::services::executor::RequestSpec;
use crate::services::normalizer::{
    coordinates, parse_date, CurrentFields, DailyFields, DEFAULT_LOCATION_NAME,
};

pub struct InternalAdapter {
    settings: ProviderSettings,
}

impl InternalAdapter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    fn request(&self, path: &str, location: &LocationQuery) -> RequestSpec {
        let spec = self.settings.endpoint(path);
        let spec = match location {
            LocationQuery::Coordinates(c) => spec.param("lat", c.lat).param("lon", c.lon),
            LocationQuery::City(name) => spec.param("q", name),
        };
        let spec = spec.param("lang", &self.settings.lang);
        match &self.settings.api_key {
            Some(key) => spec.param("key", key),
            None => spec,
        }
    }
}

impl ProviderAdapter for InternalAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Internal
    }

    fn requires_coordinates(&self) -> bool {
        true
    }

    fn current_request(&self, location: &LocationQuery) -> RequestSpec {
        self.request("current", location)
    }

    fn forecast_request(&self, location: &LocationQuery, days: u32) -> RequestSpec {
        self.request("forecast", location).param("days", days)
    }

    fn history_request(&self, location: &LocationQuery, days: u32) -> Option<RequestSpec> {
        Some(self.request("history", location).param("days", days))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Payload {
    location: Option<Location>,
    /// Older responses put the name at the top level.
    name: Option<String>,
    coord: Option<Coord>,
    current: Option<Current>,
    #[serde(default, alias = "forecast")]
    daily: Vec<Daily>,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Coord {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Current {
    #[serde(alias = "temperature")]
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    /// km/h
    wind_speed: Option<f64>,
    wind_deg: Option<f64>,
    #[serde(alias = "cloud_cover")]
    clouds: Option<f64>,
    precipitation: Option<f64>,
    precipitation_probability: Option<f64>,
    #[serde(alias = "description")]
    condition: Option<String>,
    icon: Option<String>,
    is_day: Option<bool>,
    #[serde(alias = "timestamp")]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    date: String,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<f64>,
    precipitation_probability: Option<f64>,
    precipitation: Option<f64>,
    wind_speed: Option<f64>,
    #[serde(alias = "description")]
    condition: Option<String>,
    icon: Option<String>,
}

impl Payload {
    fn location_name(&self) -> Option<String> {
        self.location
            .as_ref()
            .and_then(|l| l.name.clone())
            .or_else(|| self.name.clone())
    }

    fn country(&self) -> Option<String> {
        self.location.as_ref().and_then(|l| l.country.clone())
    }
}

pub(crate) fn current_fields(payload: Payload) -> CurrentFields {
    let location_name = payload.location_name();
    let country = payload.country();
    let lat = payload.coord.as_ref().and_then(|c| c.lat);
    let lon = payload.coord.as_ref().and_then(|c| c.lon);
    let Some(current) = payload.current else {
        return CurrentFields {
            location_name,
            country,
            lat,
            lon,
            ..CurrentFields::default()
        };
    };

    CurrentFields {
        location_name,
        country,
        lat,
        lon,
        temperature_c: current.temp,
        feels_like_c: current.feels_like,
        humidity: current.humidity,
        pressure_hpa: current.pressure,
        wind_speed_kmh: current.wind_speed,
        wind_direction_deg: current.wind_deg,
        cloud_cover: current.clouds,
        precipitation_mm: current.precipitation,
        precipitation_probability: current.precipitation_probability,
        condition: current.condition,
        icon: current.icon,
        is_day: current.is_day,
        observed_at: current.dt,
    }
}

pub(crate) fn daily_snapshot(payload: Payload) -> ForecastSnapshot {
    let location_name = payload
        .location_name()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string());
    let country = payload.country();
    let coordinates = payload
        .coord
        .as_ref()
        .and_then(|c| coordinates(c.lat, c.lon));

    let days = payload
        .daily
        .into_iter()
        .filter_map(|day| {
            DailyFields {
                date: parse_date(&day.date),
                temperature_min_c: day.temp_min,
                temperature_max_c: day.temp_max,
                humidity: day.humidity,
                precipitation_probability: day.precipitation_probability,
                precipitation_mm: day.precipitation,
                wind_speed_kmh: day.wind_speed,
                condition: day.condition,
                icon: day.icon,
            }
            .into_daily()
        })
        .collect();

    ForecastSnapshot {
        location_name,
        country,
        coordinates,
        days,
        generated_at: Utc::now(),
        is_fallback: false,
    }
}
