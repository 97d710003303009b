//! Metrics and server configuration.

use std::env;

/// Configuration for application metrics collection
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let enabled = env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        Self { enabled }
    }
}

/// Address the HTTP server binds to.
pub fn bind_address() -> String {
    env::var("BIND_ADDRESS")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;

    #[test]
    fn test_metrics_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("METRICS_ENABLED");
        }
        assert!(MetricsConfig::from_env().enabled);

        unsafe {
            env::set_var("METRICS_ENABLED", "false");
        }
        assert!(!MetricsConfig::from_env().enabled);

        unsafe {
            env::set_var("METRICS_ENABLED", "not-a-bool");
        }
        assert!(MetricsConfig::from_env().enabled);

        unsafe {
            env::remove_var("METRICS_ENABLED");
        }
    }

    #[test]
    fn test_bind_address() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("BIND_ADDRESS");
        }
        assert_eq!(bind_address(), "127.0.0.1:8080");

        unsafe {
            env::set_var("BIND_ADDRESS", "0.0.0.0:9000");
        }
        assert_eq!(bind_address(), "0.0.0.0:9000");

        unsafe {
            env::remove_var("BIND_ADDRESS");
        }
    }
}
