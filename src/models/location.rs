//! Location inputs and their validated forms.

use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::validation::ValidationError;

/// Geographic coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Build a coordinate pair, rejecting values outside the valid ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lon.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(ValidationError::CoordinatesOutOfRange);
        }
        Ok(Self { lat, lon })
    }

    /// Coordinates rounded to four decimals (~11 m), used for cache identity.
    pub fn rounded(&self) -> Self {
        Self {
            lat: (self.lat * 10_000.0).round() / 10_000.0,
            lon: (self.lon * 10_000.0).round() / 10_000.0,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// A location exactly as a caller supplied it, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    Name(String),
    Coordinates { lat: f64, lon: f64 },
}

impl LocationInput {
    pub fn name(value: impl Into<String>) -> Self {
        Self::Name(value.into())
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Self::Coordinates { lat, lon }
    }
}

/// A validated location. Exactly one representation is carried per request.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Trimmed, NFKC-normalized place name.
    City(String),
    Coordinates(Coordinates),
}

impl LocationQuery {
    /// Human readable label, also used as the hint for synthesized data.
    pub fn label(&self) -> String {
        match self {
            LocationQuery::City(name) => name.clone(),
            LocationQuery::Coordinates(coords) => {
                format!("{:.2}, {:.2}", coords.lat, coords.lon)
            }
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            LocationQuery::City(_) => None,
            LocationQuery::Coordinates(coords) => Some(*coords),
        }
    }

    /// Identity used in cache keys: case and whitespace insensitive for names,
    /// fixed precision for coordinates.
    pub fn identity(&self) -> String {
        match self {
            LocationQuery::City(name) => {
                let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
                format!("city:{}", collapsed.to_lowercase())
            }
            LocationQuery::Coordinates(coords) => format!("coords:{}", coords.rounded()),
        }
    }
}
