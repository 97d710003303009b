//! WeatherAPI.com adapter.

use chrono::{Days, Utc};
use serde::Deserialize;

use super::{ProviderAdapter, ProviderKind, ProviderSettings};
use crate::models::location::LocationQuery;
use crate::models::weather::ForecastSnapshot;
use crate::services::executor::RequestSpec;
use crate::services::normalizer::{
    coordinates, parse_date, CurrentFields, DailyFields, DEFAULT_LOCATION_NAME,
};

/// Error code WeatherAPI returns (with HTTP 400) for unknown places.
const NO_MATCHING_LOCATION: u32 = 1006;

pub struct WeatherApiAdapter {
    settings: ProviderSettings,
}

impl WeatherApiAdapter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    fn request(&self, path: &str, location: &LocationQuery) -> RequestSpec {
        let q = match location {
            LocationQuery::City(name) => name.clone(),
            LocationQuery::Coordinates(c) => format!("{},{}", c.lat, c.lon),
        };
        let spec = self
            .settings
            .endpoint(path)
            .param("q", q)
            .param("lang", &self.settings.lang);
        match &self.settings.api_key {
            Some(key) => spec.param("key", key),
            None => spec,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: u32,
}

impl ProviderAdapter for WeatherApiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WeatherApi
    }

    fn current_request(&self, location: &LocationQuery) -> RequestSpec {
        self.request("current.json", location)
    }

    fn forecast_request(&self, location: &LocationQuery, days: u32) -> RequestSpec {
        self.request("forecast.json", location).param("days", days)
    }

    /// The `days` full days before today, oldest first.
    fn history_request(&self, location: &LocationQuery, days: u32) -> Option<RequestSpec> {
        let today = Utc::now().date_naive();
        let start = today.checked_sub_days(Days::new(u64::from(days.max(1))))?;
        let end = today.checked_sub_days(Days::new(1))?;
        Some(
            self.request("history.json", location)
                .param("dt", start.format("%Y-%m-%d"))
                .param("end_dt", end.format("%Y-%m-%d")),
        )
    }

    fn is_not_found(&self, status: u16, body: &str) -> bool {
        match status {
            404 => true,
            400 => serde_json::from_str::<ErrorEnvelope>(body)
                .is_ok_and(|envelope| envelope.error.code == NO_MATCHING_LOCATION),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    location: Option<Location>,
    current: Option<Current>,
    forecast: Option<Forecast>,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: Option<f64>,
    feelslike_c: Option<f64>,
    humidity: Option<f64>,
    pressure_mb: Option<f64>,
    wind_kph: Option<f64>,
    wind_degree: Option<f64>,
    cloud: Option<f64>,
    precip_mm: Option<f64>,
    chance_of_rain: Option<f64>,
    condition: Option<Condition>,
    is_day: Option<u8>,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    date: String,
    day: Option<Day>,
}

#[derive(Debug, Deserialize)]
struct Day {
    maxtemp_c: Option<f64>,
    mintemp_c: Option<f64>,
    avghumidity: Option<f64>,
    daily_chance_of_rain: Option<f64>,
    daily_chance_of_snow: Option<f64>,
    totalprecip_mm: Option<f64>,
    maxwind_kph: Option<f64>,
    condition: Option<Condition>,
}

pub(crate) fn current_fields(payload: Envelope) -> CurrentFields {
    let location = payload.location;
    let Some(current) = payload.current else {
        return CurrentFields {
            location_name: location.as_ref().and_then(|l| l.name.clone()),
            country: location.as_ref().and_then(|l| l.country.clone()),
            ..CurrentFields::default()
        };
    };
    let condition = current.condition;

    CurrentFields {
        location_name: location.as_ref().and_then(|l| l.name.clone()),
        country: location.as_ref().and_then(|l| l.country.clone()),
        lat: location.as_ref().and_then(|l| l.lat),
        lon: location.as_ref().and_then(|l| l.lon),
        temperature_c: current.temp_c,
        feels_like_c: current.feelslike_c,
        humidity: current.humidity,
        pressure_hpa: current.pressure_mb,
        wind_speed_kmh: current.wind_kph,
        wind_direction_deg: current.wind_degree,
        cloud_cover: current.cloud,
        precipitation_mm: current.precip_mm,
        precipitation_probability: current.chance_of_rain,
        condition: condition.as_ref().and_then(|c| c.text.clone()),
        icon: condition.and_then(|c| c.icon),
        is_day: current.is_day.map(|flag| flag != 0),
        observed_at: current.last_updated_epoch,
    }
}

pub(crate) fn daily_snapshot(payload: Envelope) -> ForecastSnapshot {
    let days = payload
        .forecast
        .map(|f| f.forecastday)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| {
            let day = entry.day?;
            DailyFields {
                date: parse_date(&entry.date),
                temperature_min_c: day.mintemp_c,
                temperature_max_c: day.maxtemp_c,
                humidity: day.avghumidity,
                precipitation_probability: match (day.daily_chance_of_rain, day.daily_chance_of_snow) {
                    (Some(rain), Some(snow)) => Some(rain.max(snow)),
                    (rain, snow) => rain.or(snow),
                },
                precipitation_mm: day.totalprecip_mm,
                wind_speed_kmh: day.maxwind_kph,
                condition: day.condition.as_ref().and_then(|c| c.text.clone()),
                icon: day.condition.and_then(|c| c.icon),
            }
            .into_daily()
        })
        .collect();

    let location = payload.location;
    ForecastSnapshot {
        location_name: location
            .as_ref()
            .and_then(|l| l.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string()),
        country: location.as_ref().and_then(|l| l.country.clone()),
        coordinates: location.as_ref().and_then(|l| coordinates(l.lat, l.lon)),
        days,
        generated_at: Utc::now(),
        is_fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::Coordinates;

    fn adapter() -> WeatherApiAdapter {
        WeatherApiAdapter::new(
            ProviderSettings::new(ProviderKind::WeatherApi, "http://wapi.test/v1").with_api_key("k"),
        )
    }

    #[test]
    fn test_coordinates_are_sent_as_pair() {
        let location = LocationQuery::Coordinates(Coordinates::new(48.85, 2.35).unwrap());
        let spec = adapter().current_request(&location);
        assert_eq!(spec.url, "http://wapi.test/v1/current.json");
        assert!(spec.query.contains(&("q".to_string(), "48.85,2.35".to_string())));
        assert!(spec.query.contains(&("key".to_string(), "k".to_string())));
    }

    #[test]
    fn test_history_request_ends_yesterday() {
        let spec = adapter()
            .history_request(&LocationQuery::City("Lima".into()), 3)
            .unwrap();
        let today = Utc::now().date_naive();
        let expected_end = (today - Days::new(1)).format("%Y-%m-%d").to_string();
        let expected_start = (today - Days::new(3)).format("%Y-%m-%d").to_string();
        assert!(spec.query.contains(&("end_dt".to_string(), expected_end)));
        assert!(spec.query.contains(&("dt".to_string(), expected_start)));
    }

    #[test]
    fn test_not_found_detection() {
        let adapter = adapter();
        let body = r#"{"error":{"code":1006,"message":"No matching location found."}}"#;
        assert!(adapter.is_not_found(400, body));
        assert!(adapter.is_not_found(404, ""));
        assert!(!adapter.is_not_found(400, r#"{"error":{"code":1003}}"#));
        assert!(!adapter.is_not_found(401, body));
    }
}
