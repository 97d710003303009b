//! HTTP request handlers for API endpoints.
//!
//! Health, version and metrics endpoints, the weather endpoints backed by
//! [`crate::services::WeatherService`], and the app factory that wires them.

pub mod health;
pub mod metrics;
pub mod openapi;
pub mod version;
pub mod weather;

pub use health::*;
pub use metrics::*;
pub use openapi::*;
pub use version::*;
pub use weather::*;
