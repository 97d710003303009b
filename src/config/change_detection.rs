//! Change detection configuration.

use std::env;
use std::time::Duration;

use crate::services::change_detector::ChangeThresholds;

impl ChangeThresholds {
    /// Load thresholds from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = ChangeThresholds::default();
        let threshold = |name: &str, default: f64| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|t| t.is_finite() && *t > 0.0)
                .unwrap_or(default)
        };

        Self {
            temperature_c: threshold("CHANGE_TEMP_THRESHOLD_C", defaults.temperature_c),
            precipitation_pct: threshold("CHANGE_PRECIP_THRESHOLD_PCT", defaults.precipitation_pct),
            precipitation_mm: threshold("CHANGE_PRECIP_THRESHOLD_MM", defaults.precipitation_mm),
            wind_speed_kmh: threshold("CHANGE_WIND_THRESHOLD_KMH", defaults.wind_speed_kmh),
        }
    }
}

/// Locations the server watches for weather changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMonitorConfig {
    pub thresholds: ChangeThresholds,
    pub poll_interval: Duration,
    /// Raw place names; validated when monitoring starts
    pub watch_locations: Vec<String>,
}

impl Default for ChangeMonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: ChangeThresholds::default(),
            poll_interval: Duration::from_secs(30 * 60),
            watch_locations: Vec::new(),
        }
    }
}

impl ChangeMonitorConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let poll_minutes: u64 = env::var("CHANGE_POLL_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|m| *m > 0)
            .unwrap_or(30);

        let watch_locations = env::var("CHANGE_WATCH_LOCATIONS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            thresholds: ChangeThresholds::from_env(),
            poll_interval: Duration::from_secs(poll_minutes * 60),
            watch_locations,
        }
    }
}
