//! OpenWeatherMap 2.5 adapter.
//!
//! Current conditions come from `/weather`, forecasts from the 3-hourly
//! `/forecast` feed aggregated into calendar days (UTC). The free tier has
//! no history endpoint.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{ProviderAdapter, ProviderKind, ProviderSettings};
use crate::models::location::LocationQuery;
use crate::models::weather::ForecastSnapshot;
use crate::services::executor::RequestSpec;
use crate::services::normalizer::{
    coordinates, ms_to_kmh, CurrentFields, DailyFields, DEFAULT_LOCATION_NAME,
};

/// Forecast entries per day in the 3-hourly feed.
const SLOTS_PER_DAY: u32 = 8;

pub struct OpenWeatherMapAdapter {
    settings: ProviderSettings,
}

impl OpenWeatherMapAdapter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    fn request(&self, path: &str, location: &LocationQuery) -> RequestSpec {
        let spec = self.settings.endpoint(path);
        let spec = match location {
            LocationQuery::City(name) => spec.param("q", name),
            LocationQuery::Coordinates(c) => spec.param("lat", c.lat).param("lon", c.lon),
        };
        let spec = spec.param("units", "metric").param("lang", &self.settings.lang);
        match &self.settings.api_key {
            Some(key) => spec.param("appid", key),
            None => spec,
        }
    }
}

impl ProviderAdapter for OpenWeatherMapAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenWeatherMap
    }

    fn current_request(&self, location: &LocationQuery) -> RequestSpec {
        self.request("weather", location)
    }

    fn forecast_request(&self, location: &LocationQuery, days: u32) -> RequestSpec {
        self.request("forecast", location)
            .param("cnt", days.saturating_mul(SLOTS_PER_DAY))
    }

    fn history_request(&self, _location: &LocationQuery, _days: u32) -> Option<RequestSpec> {
        None
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Current {
    name: Option<String>,
    coord: Option<Coord>,
    sys: Option<Sys>,
    main: Option<Main>,
    wind: Option<Wind>,
    clouds: Option<Clouds>,
    rain: Option<Volume>,
    snow: Option<Volume>,
    #[serde(default)]
    weather: Vec<Condition>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Coord {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Sys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: Option<f64>,
    feels_like: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    /// m/s with `units=metric`
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    all: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: Option<String>,
    description: Option<String>,
    icon: Option<String>,
}

impl Condition {
    fn text(&self) -> Option<String> {
        self.description.clone().or_else(|| self.main.clone())
    }
}

fn volume(rain: Option<&Volume>, snow: Option<&Volume>) -> Option<f64> {
    let amount = |v: Option<&Volume>| v.and_then(|v| v.one_hour.or(v.three_hours));
    match (amount(rain), amount(snow)) {
        (None, None) => None,
        (r, s) => Some(r.unwrap_or(0.0) + s.unwrap_or(0.0)),
    }
}

pub(crate) fn current_fields(payload: Current) -> CurrentFields {
    let condition = payload.weather.first();
    let icon = condition.and_then(|c| c.icon.clone());
    CurrentFields {
        location_name: payload.name,
        country: payload.sys.and_then(|s| s.country),
        lat: payload.coord.as_ref().and_then(|c| c.lat),
        lon: payload.coord.as_ref().and_then(|c| c.lon),
        temperature_c: payload.main.as_ref().and_then(|m| m.temp),
        feels_like_c: payload.main.as_ref().and_then(|m| m.feels_like),
        humidity: payload.main.as_ref().and_then(|m| m.humidity),
        pressure_hpa: payload.main.as_ref().and_then(|m| m.pressure),
        wind_speed_kmh: payload.wind.as_ref().and_then(|w| w.speed).map(ms_to_kmh),
        wind_direction_deg: payload.wind.as_ref().and_then(|w| w.deg),
        cloud_cover: payload.clouds.and_then(|c| c.all),
        precipitation_mm: volume(payload.rain.as_ref(), payload.snow.as_ref()),
        precipitation_probability: None,
        condition: condition.and_then(Condition::text),
        is_day: icon.as_deref().map(|code| !code.ends_with('n')),
        icon,
        observed_at: payload.dt,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Forecast {
    city: Option<City>,
    #[serde(default)]
    list: Vec<Slot>,
}

#[derive(Debug, Deserialize)]
struct City {
    name: Option<String>,
    country: Option<String>,
    coord: Option<Coord>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    dt: i64,
    main: Option<Main>,
    #[serde(default)]
    weather: Vec<Condition>,
    wind: Option<Wind>,
    /// Probability of precipitation, 0..=1
    pop: Option<f64>,
    rain: Option<Volume>,
    snow: Option<Volume>,
}

fn max_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

fn min_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
}

/// Collapse one day of 3-hourly slots. The slot nearest midday supplies the
/// condition.
fn aggregate_day(date: NaiveDate, slots: &[(DateTime<Utc>, &Slot)]) -> DailyFields {
    let mains = || slots.iter().filter_map(|(_, s)| s.main.as_ref());
    let humidities: Vec<f64> = mains().filter_map(|m| m.humidity).collect();
    let precipitation: Vec<f64> = slots
        .iter()
        .filter_map(|(_, s)| s.rain.as_ref().or(s.snow.as_ref()).and_then(|v| v.three_hours))
        .collect();
    let midday = slots
        .iter()
        .min_by_key(|(time, _)| (time.hour() as i32 - 12).abs())
        .map(|(_, slot)| *slot);
    let condition = midday.and_then(|s| s.weather.first());

    DailyFields {
        date: Some(date),
        temperature_min_c: min_of(mains().filter_map(|m| m.temp_min.or(m.temp))),
        temperature_max_c: max_of(mains().filter_map(|m| m.temp_max.or(m.temp))),
        humidity: (!humidities.is_empty())
            .then(|| humidities.iter().sum::<f64>() / humidities.len() as f64),
        precipitation_probability: max_of(slots.iter().filter_map(|(_, s)| s.pop))
            .map(|p| p * 100.0),
        precipitation_mm: (!precipitation.is_empty()).then(|| precipitation.iter().sum()),
        wind_speed_kmh: max_of(
            slots
                .iter()
                .filter_map(|(_, s)| s.wind.as_ref().and_then(|w| w.speed)),
        )
        .map(ms_to_kmh),
        condition: condition.and_then(Condition::text),
        icon: condition.and_then(|c| c.icon.clone()),
    }
}

pub(crate) fn daily_snapshot(payload: Forecast) -> ForecastSnapshot {
    let mut by_date: BTreeMap<NaiveDate, Vec<(DateTime<Utc>, &Slot)>> = BTreeMap::new();
    for slot in &payload.list {
        if let Some(time) = DateTime::from_timestamp(slot.dt, 0) {
            by_date.entry(time.date_naive()).or_default().push((time, slot));
        }
    }

    let days = by_date
        .iter()
        .filter_map(|(date, slots)| aggregate_day(*date, slots).into_daily())
        .collect();

    let city = payload.city;
    ForecastSnapshot {
        location_name: city
            .as_ref()
            .and_then(|c| c.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string()),
        country: city.as_ref().and_then(|c| c.country.clone()),
        coordinates: city
            .as_ref()
            .and_then(|c| c.coord.as_ref())
            .and_then(|c| coordinates(c.lat, c.lon)),
        days,
        generated_at: Utc::now(),
        is_fallback: false,
    }
}
