//! Synthesized weather for when every provider has failed.
//!
//! Values are random but stay inside the ranges documented below, and every
//! result is flagged `is_fallback`. Results are never cached.

use chrono::{Days, NaiveDate, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::ops::RangeInclusive;

use crate::models::location::{Coordinates, LocationQuery};
use crate::models::weather::{ConditionFamily, DailyConditions, ForecastSnapshot, WeatherSnapshot};
use crate::services::normalizer::round1;

/// Conditions a synthesized snapshot can report.
pub const FALLBACK_CONDITIONS: [&str; 5] =
    ["Clear sky", "Partly cloudy", "Overcast", "Light rain", "Mist"];

/// Temperature range (°C) when the location has no coordinates.
pub const DEFAULT_TEMPERATURE_RANGE: RangeInclusive<f64> = 5.0..=25.0;
pub const TROPICAL_TEMPERATURE_RANGE: RangeInclusive<f64> = 20.0..=32.0;
pub const TEMPERATE_TEMPERATURE_RANGE: RangeInclusive<f64> = 5.0..=26.0;
pub const SUBPOLAR_TEMPERATURE_RANGE: RangeInclusive<f64> = -5.0..=18.0;
pub const POLAR_TEMPERATURE_RANGE: RangeInclusive<f64> = -25.0..=5.0;

pub const HUMIDITY_RANGE: RangeInclusive<u8> = 30..=90;
pub const PRESSURE_RANGE: RangeInclusive<u32> = 995..=1030;
/// km/h
pub const WIND_SPEED_RANGE: RangeInclusive<f64> = 0.0..=25.0;

/// Plausible temperatures for a latitude band.
pub fn temperature_range(coordinates: Option<Coordinates>) -> RangeInclusive<f64> {
    let Some(coordinates) = coordinates else {
        return DEFAULT_TEMPERATURE_RANGE;
    };
    match coordinates.lat.abs() {
        lat if lat < 23.5 => TROPICAL_TEMPERATURE_RANGE,
        lat if lat < 45.0 => TEMPERATE_TEMPERATURE_RANGE,
        lat if lat < 66.5 => SUBPOLAR_TEMPERATURE_RANGE,
        _ => POLAR_TEMPERATURE_RANGE,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackSynthesizer;

impl FallbackSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, location: &LocationQuery) -> WeatherSnapshot {
        let mut rng = rand::rng();
        let coordinates = location.coordinates();
        let condition = FALLBACK_CONDITIONS
            .choose(&mut rng)
            .copied()
            .unwrap_or(FALLBACK_CONDITIONS[0]);
        let family = ConditionFamily::from_description(condition);
        let wet = family == ConditionFamily::Rain;

        let temperature_c = round1(rng.random_range(temperature_range(coordinates)));
        let cloud_cover = match family {
            ConditionFamily::Clear => rng.random_range(0..=20),
            _ => rng.random_range(40..=100),
        };

        WeatherSnapshot {
            location_name: location.label(),
            country: None,
            coordinates,
            temperature_c,
            feels_like_c: Some(round1(temperature_c + rng.random_range(-2.0..=2.0))),
            humidity: Some(rng.random_range(HUMIDITY_RANGE)),
            pressure_hpa: Some(rng.random_range(PRESSURE_RANGE)),
            wind_speed_kmh: Some(round1(rng.random_range(WIND_SPEED_RANGE))),
            wind_direction_deg: Some(rng.random_range(0..360)),
            cloud_cover: Some(cloud_cover),
            precipitation_mm: Some(if wet { round1(rng.random_range(0.1..=2.0)) } else { 0.0 }),
            precipitation_probability: Some(if wet {
                f64::from(rng.random_range(40u8..=90))
            } else {
                f64::from(rng.random_range(0u8..=20))
            }),
            condition: Some(condition.to_string()),
            icon: Some(family.icon_code(true)),
            observed_at: Utc::now(),
            is_fallback: true,
        }
    }

    /// `days` consecutive days starting today.
    pub fn synthesize_forecast(&self, location: &LocationQuery, days: u32) -> ForecastSnapshot {
        let today = Utc::now().date_naive();
        let dates = (0..days).filter_map(|offset| today.checked_add_days(Days::new(u64::from(offset))));
        self.synthesize_days(location, dates.collect())
    }

    /// The `days` full days before today, oldest first.
    pub fn synthesize_history(&self, location: &LocationQuery, days: u32) -> ForecastSnapshot {
        let today = Utc::now().date_naive();
        let dates = (1..=days)
            .rev()
            .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))));
        self.synthesize_days(location, dates.collect())
    }

    fn synthesize_days(&self, location: &LocationQuery, dates: Vec<NaiveDate>) -> ForecastSnapshot {
        let mut rng = rand::rng();
        let range = temperature_range(location.coordinates());

        let days = dates
            .into_iter()
            .map(|date| {
                let a = rng.random_range(range.clone());
                let b = rng.random_range(range.clone());
                let condition = FALLBACK_CONDITIONS
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(FALLBACK_CONDITIONS[0]);
                let family = ConditionFamily::from_description(condition);
                let wet = family == ConditionFamily::Rain;
                DailyConditions {
                    date,
                    temperature_min_c: Some(round1(a.min(b))),
                    temperature_max_c: Some(round1(a.max(b))),
                    humidity: Some(rng.random_range(HUMIDITY_RANGE)),
                    precipitation_probability: Some(if wet { 60.0 } else { 10.0 }),
                    precipitation_mm: Some(if wet { round1(rng.random_range(1.0..=8.0)) } else { 0.0 }),
                    wind_speed_kmh: Some(round1(rng.random_range(WIND_SPEED_RANGE))),
                    condition: Some(condition.to_string()),
                    icon: Some(family.icon_code(true)),
                }
            })
            .collect();

        ForecastSnapshot {
            location_name: location.label(),
            country: None,
            coordinates: location.coordinates(),
            days,
            generated_at: Utc::now(),
            is_fallback: true,
        }
    }
}
