//! API request and response models for the HTTP surface.

use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

use crate::models::{location::LocationInput, weather::WeatherSnapshot};
use crate::services::validation::ValidationError;

/// Response model for the health check endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response model for the version information endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
    pub build_time: String,
}

/// Query parameters identifying a single location.
///
/// Either `city` or both `lat` and `lon` must be supplied, never both.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Apiv2Schema)]
pub struct WeatherQuery {
    /// Place name (e.g., "London")
    pub city: Option<String>,
    /// Latitude coordinate
    pub lat: Option<f64>,
    /// Longitude coordinate
    pub lon: Option<f64>,
}

impl WeatherQuery {
    /// Resolve the query into exactly one location representation.
    pub fn location(&self) -> Result<LocationInput, ValidationError> {
        match (&self.city, self.lat, self.lon) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(ValidationError::AmbiguousLocation)
            }
            (Some(city), None, None) => Ok(LocationInput::Name(city.clone())),
            (None, Some(lat), Some(lon)) => Ok(LocationInput::Coordinates { lat, lon }),
            _ => Err(ValidationError::MissingLocation),
        }
    }
}

/// Query parameters for the forecast endpoint
#[derive(Clone, Debug, Default, Serialize, Deserialize, Apiv2Schema)]
pub struct ForecastQuery {
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Number of days, 1 to 7 (default 5)
    pub days: Option<u32>,
}

impl ForecastQuery {
    pub fn location(&self) -> Result<LocationInput, ValidationError> {
        WeatherQuery {
            city: self.city.clone(),
            lat: self.lat,
            lon: self.lon,
        }
        .location()
    }
}

/// Query parameters for the historical weather endpoint
#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct HistoryQuery {
    pub city: String,
    /// Number of past days, 1 to 7 (default 3)
    pub days: Option<u32>,
}

/// Query parameters for search-as-you-type city lookup
#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct CitySearchQuery {
    pub q: String,
}

/// Query parameters for the multi-city endpoint
#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct BatchWeatherQuery {
    /// Comma separated city names (e.g., "London,Paris,Oslo")
    pub cities: String,
}

impl BatchWeatherQuery {
    pub fn locations(&self) -> Vec<LocationInput> {
        self.cities
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(LocationInput::name)
            .collect()
    }
}

/// Outcome of one branch of a multi-city lookup
#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct CityWeatherResult {
    /// The location as requested
    pub query: String,
    pub weather: Option<WeatherSnapshot>,
    /// User-safe error text when this branch failed terminally
    pub error: Option<String>,
}
