//! Retry policy configuration.

use std::env;
use std::time::Duration;

use crate::services::executor::RetryPolicy;

impl RetryPolicy {
    /// Load retry settings from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = RetryPolicy::default();

        let max_retries = env::var("WEATHER_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        let base_delay = env::var("WEATHER_RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay);

        let multiplier = env::var("WEATHER_RETRY_MULTIPLIER")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|m| m.is_finite() && *m >= 1.0)
            .unwrap_or(defaults.multiplier);

        let max_delay = env::var("WEATHER_RETRY_MAX_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay);

        let jitter = env::var("WEATHER_RETRY_JITTER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.jitter);

        let retry_on_timeout = env::var("WEATHER_RETRY_ON_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        let policy = Self {
            max_retries,
            base_delay,
            multiplier,
            max_delay,
            jitter,
            ..defaults
        };

        if retry_on_timeout {
            policy.with_timeout_retries()
        } else {
            policy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;
    use crate::services::executor::{ExecutorError, RetryDecision};

    const VARS: [&str; 6] = [
        "WEATHER_MAX_RETRIES",
        "WEATHER_RETRY_BASE_DELAY_MS",
        "WEATHER_RETRY_MULTIPLIER",
        "WEATHER_RETRY_MAX_DELAY_MS",
        "WEATHER_RETRY_JITTER",
        "WEATHER_RETRY_ON_TIMEOUT",
    ];

    fn clear() {
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_retry_policy_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();

        let policy = RetryPolicy::from_env();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.multiplier, 2.0);
        assert!(!policy.jitter);
        assert_eq!(
            policy.classify(&ExecutorError::Timeout(Duration::from_secs(1))),
            RetryDecision::Terminal
        );
    }

    #[test]
    fn test_retry_policy_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::set_var("WEATHER_MAX_RETRIES", "4");
            env::set_var("WEATHER_RETRY_BASE_DELAY_MS", "50");
            env::set_var("WEATHER_RETRY_MAX_DELAY_MS", "200");
            env::set_var("WEATHER_RETRY_JITTER", "true");
            env::set_var("WEATHER_RETRY_ON_TIMEOUT", "true");
        }

        let policy = RetryPolicy::from_env();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_millis(200));
        assert!(policy.jitter);
        assert_eq!(
            policy.classify(&ExecutorError::Timeout(Duration::from_secs(1))),
            RetryDecision::Retry
        );

        clear();
    }

    #[test]
    fn test_invalid_multiplier_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();
        unsafe {
            env::set_var("WEATHER_RETRY_MULTIPLIER", "0.5");
        }

        assert_eq!(RetryPolicy::from_env().multiplier, 2.0);

        clear();
    }
}
