//! Tarnished Weather - resilient weather data acquisition
//!
//! A weather pipeline built with Actix Web and Paperclip that:
//! - Validates and normalizes free-text locations before they reach a provider
//! - Executes provider requests with deadlines and classified retries
//! - Fails over between providers and degrades to synthesized data
//! - Normalizes every provider schema into one canonical model
//! - Caches real responses with per-operation TTLs
//! - Watches locations for significant weather changes
//!
//! ## Architecture
//!
//! - `models/` - Location inputs, canonical snapshots and API models
//! - `services/` - Pipeline components and the [`WeatherService`] that wires them
//! - `handlers/` - HTTP request handlers and the app factory
//! - `middleware/` - Request IDs and HTTP metrics
//! - `utils/` - Route labels and credential masking
//! - `config/` - Configuration structures and environment loading
//!
//! ## Quick Start
//!
//! ```no_run
//! use tarnished_weather::{LocationInput, PipelineConfig, WeatherService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = WeatherService::from_config(&PipelineConfig::from_env(), None)?;
//!     let snapshot = service
//!         .get_current_weather(&LocationInput::name("London"))
//!         .await?;
//!     println!("{} {}°C", snapshot.location_name, snapshot.temperature_c);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{ChangeMonitorConfig, MetricsConfig, PipelineConfig};
pub use handlers::{create_app, create_openapi_spec};
pub use middleware::{MetricsMiddleware, RequestIdMiddleware};
pub use models::{
    ChangeAlert, ChangeReport, CityMatch, ForecastSnapshot, LocationInput, WeatherOverview,
    WeatherSnapshot,
};
pub use services::{
    AppMetrics, ChangeDetector, ChangeThresholds, InputValidator, ValidationError, WeatherError,
    WeatherService,
};
