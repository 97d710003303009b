//! Canonical weather data structures.
//!
//! Every provider schema is mapped into these types by the normalizer, so
//! callers never need to know which upstream produced the data.

use chrono::{DateTime, NaiveDate, Utc};
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

use crate::models::location::Coordinates;

/// Coarse grouping of free-text condition descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFamily {
    Clear,
    Cloudy,
    Fog,
    Rain,
    Storm,
    Snow,
    Unknown,
}

impl ConditionFamily {
    /// Classify a condition description such as "light rain" or "Overcast".
    pub fn from_description(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["thunder", "storm", "tornado", "squall"]) {
            ConditionFamily::Storm
        } else if has(&["snow", "sleet", "blizzard", "ice", "hail"]) {
            ConditionFamily::Snow
        } else if has(&["rain", "drizzle", "shower"]) {
            ConditionFamily::Rain
        } else if has(&["fog", "mist", "haze", "smoke", "dust", "sand", "ash"]) {
            ConditionFamily::Fog
        } else if has(&["cloud", "overcast"]) {
            ConditionFamily::Cloudy
        } else if has(&["clear", "sun", "fair"]) {
            ConditionFamily::Clear
        } else {
            ConditionFamily::Unknown
        }
    }

    /// OpenWeatherMap-style icon code, used as the canonical icon vocabulary.
    pub fn icon_code(&self, is_day: bool) -> String {
        let base = match self {
            ConditionFamily::Clear => "01",
            ConditionFamily::Cloudy => "04",
            ConditionFamily::Fog => "50",
            ConditionFamily::Rain => "10",
            ConditionFamily::Storm => "11",
            ConditionFamily::Snow => "13",
            ConditionFamily::Unknown => "03",
        };
        format!("{base}{}", if is_day { 'd' } else { 'n' })
    }
}

/// Canonical current-conditions snapshot.
///
/// Only `location_name` and `temperature_c` are mandatory; everything else
/// is reported when the upstream supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub country: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Degrees Celsius, one decimal.
    pub temperature_c: f64,
    pub feels_like_c: Option<f64>,
    /// Relative humidity, percent.
    pub humidity: Option<u8>,
    /// Sea level pressure, hPa.
    pub pressure_hpa: Option<u32>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_deg: Option<u16>,
    /// Cloud cover, percent.
    pub cloud_cover: Option<u8>,
    /// Precipitation volume over the last hour, mm.
    pub precipitation_mm: Option<f64>,
    /// Chance of precipitation, percent.
    pub precipitation_probability: Option<f64>,
    pub condition: Option<String>,
    pub icon: Option<String>,
    pub observed_at: DateTime<Utc>,
    /// Set when the snapshot was synthesized because every provider failed.
    pub is_fallback: bool,
}

impl WeatherSnapshot {
    pub fn condition_family(&self) -> ConditionFamily {
        self.condition
            .as_deref()
            .map(ConditionFamily::from_description)
            .unwrap_or(ConditionFamily::Unknown)
    }
}

/// One day of forecast or historical conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct DailyConditions {
    pub date: NaiveDate,
    pub temperature_min_c: Option<f64>,
    pub temperature_max_c: Option<f64>,
    pub humidity: Option<u8>,
    pub precipitation_probability: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub condition: Option<String>,
    pub icon: Option<String>,
}

/// Canonical multi-day snapshot, used for both forecasts and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct ForecastSnapshot {
    pub location_name: String,
    pub country: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub days: Vec<DailyConditions>,
    pub generated_at: DateTime<Utc>,
    pub is_fallback: bool,
}

/// A geocoding match returned by city search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct CityMatch {
    pub name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub coordinates: Coordinates,
}

/// Current conditions plus an optional forecast.
///
/// The forecast is `None` when that branch failed terminally; the current
/// conditions are still returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct WeatherOverview {
    pub current: WeatherSnapshot,
    pub forecast: Option<ForecastSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_families() {
        assert_eq!(ConditionFamily::from_description("clear sky"), ConditionFamily::Clear);
        assert_eq!(ConditionFamily::from_description("Sunny"), ConditionFamily::Clear);
        assert_eq!(ConditionFamily::from_description("broken clouds"), ConditionFamily::Cloudy);
        assert_eq!(ConditionFamily::from_description("Light rain shower"), ConditionFamily::Rain);
        assert_eq!(
            ConditionFamily::from_description("Thundery outbreaks with rain"),
            ConditionFamily::Storm
        );
        assert_eq!(ConditionFamily::from_description("Patchy light snow"), ConditionFamily::Snow);
        assert_eq!(ConditionFamily::from_description("Mist"), ConditionFamily::Fog);
        assert_eq!(ConditionFamily::from_description("???"), ConditionFamily::Unknown);
    }

    #[test]
    fn test_icon_codes() {
        assert_eq!(ConditionFamily::Clear.icon_code(true), "01d");
        assert_eq!(ConditionFamily::Rain.icon_code(false), "10n");
    }
}
