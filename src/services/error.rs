//! Pipeline error taxonomy.
//!
//! Every failure surfaced by [`crate::services::weather::WeatherService`] is
//! a [`WeatherError`]. Each variant knows whether the pipeline may replace it
//! with synthesized data and which message is safe to show an end user.

use crate::services::executor::{ExecutorError, ExecutorFailure};
use crate::services::normalizer::SchemaError;
use crate::services::validation::ValidationError;

/// What the pipeline does with a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Surface the error to the caller.
    Terminal,
    /// Try the next provider, then fall back to synthesized data.
    FallbackEligible,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeatherError {
    #[error("invalid location: {0}")]
    Validation(#[from] ValidationError),

    #[error("upstream timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("unsupported upstream protocol: {scheme}")]
    Protocol { scheme: String },

    #[error("location not found")]
    NotFound,

    #[error("upstream unavailable after {attempts} attempt(s)")]
    Upstream { status: Option<u16>, attempts: u32 },

    #[error("unusable upstream payload: {0}")]
    Schema(#[from] SchemaError),
}

impl WeatherError {
    /// Map an executor failure, using `not_found` to recognise the
    /// provider's "unknown location" responses.
    pub fn from_executor(failure: ExecutorFailure, not_found: impl Fn(u16, &str) -> bool) -> Self {
        let attempts = failure.attempts;
        match failure.error {
            ExecutorError::UnsupportedProtocol(scheme) => WeatherError::Protocol { scheme },
            ExecutorError::InvalidUrl => WeatherError::Protocol {
                scheme: "invalid".to_string(),
            },
            ExecutorError::Timeout(_) => WeatherError::Timeout { attempts },
            ExecutorError::Status { status, body } if not_found(status, &body) => {
                WeatherError::NotFound
            }
            ExecutorError::Status { status, .. } => WeatherError::Upstream {
                status: Some(status),
                attempts,
            },
            ExecutorError::Network(_) => WeatherError::Upstream {
                status: None,
                attempts,
            },
        }
    }

    /// Slow, unreachable or broken upstreams fall back. Bad input, unknown
    /// locations and misconfiguration are surfaced.
    pub fn outcome(&self) -> FailureOutcome {
        match self {
            WeatherError::Timeout { .. }
            | WeatherError::Upstream { .. }
            | WeatherError::Schema(_) => FailureOutcome::FallbackEligible,
            WeatherError::Validation(_) | WeatherError::Protocol { .. } | WeatherError::NotFound => {
                FailureOutcome::Terminal
            }
        }
    }

    pub fn is_fallback_eligible(&self) -> bool {
        self.outcome() == FailureOutcome::FallbackEligible
    }

    /// Text safe to show an end user. Never includes upstream bodies, URLs
    /// or the raw input.
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::Validation(error) => match error {
                ValidationError::EmptyInput => "Please enter a location.",
                ValidationError::TooLong { .. } => "Location name is too long.",
                ValidationError::InjectionSuspected(_) | ValidationError::InvalidCharacters => {
                    "Location contains characters that are not allowed."
                }
                ValidationError::CoordinatesOutOfRange => {
                    "Latitude must be between -90 and 90 and longitude between -180 and 180."
                }
                ValidationError::MissingLocation => "Provide either a city or both lat and lon.",
                ValidationError::AmbiguousLocation => {
                    "Provide either a city or coordinates, not both."
                }
                ValidationError::DaysOutOfRange { .. } => "Requested number of days is out of range.",
            },
            WeatherError::Timeout { .. } => "The weather service timed out. Please try again.",
            WeatherError::Protocol { .. } => "The weather service is misconfigured.",
            WeatherError::NotFound => "City not found.",
            WeatherError::Upstream { .. } => "The weather service is temporarily unavailable.",
            WeatherError::Schema(_) => "The weather service returned unexpected data.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failure(error: ExecutorError, attempts: u32) -> ExecutorFailure {
        ExecutorFailure { error, attempts }
    }

    #[test]
    fn test_status_mapping() {
        let not_found = WeatherError::from_executor(
            failure(
                ExecutorError::Status {
                    status: 404,
                    body: String::new(),
                },
                1,
            ),
            |status, _| status == 404,
        );
        assert_eq!(not_found, WeatherError::NotFound);

        let unavailable = WeatherError::from_executor(
            failure(
                ExecutorError::Status {
                    status: 503,
                    body: String::new(),
                },
                3,
            ),
            |status, _| status == 404,
        );
        assert_eq!(
            unavailable,
            WeatherError::Upstream {
                status: Some(503),
                attempts: 3
            }
        );
    }

    #[test]
    fn test_outcomes() {
        assert_eq!(WeatherError::NotFound.outcome(), FailureOutcome::Terminal);
        assert_eq!(
            WeatherError::Protocol {
                scheme: "ftp".into()
            }
            .outcome(),
            FailureOutcome::Terminal
        );
        assert!(WeatherError::Timeout { attempts: 1 }.is_fallback_eligible());
        assert!(WeatherError::Upstream {
            status: None,
            attempts: 1
        }
        .is_fallback_eligible());
        assert!(WeatherError::Schema(SchemaError::InvalidJson).is_fallback_eligible());
        assert!(!WeatherError::Validation(ValidationError::EmptyInput).is_fallback_eligible());
    }

    #[test]
    fn test_timeout_and_protocol_mapping() {
        let timeout = WeatherError::from_executor(
            failure(ExecutorError::Timeout(Duration::from_secs(1)), 1),
            |_, _| false,
        );
        assert_eq!(timeout, WeatherError::Timeout { attempts: 1 });

        let protocol = WeatherError::from_executor(
            failure(ExecutorError::UnsupportedProtocol("ftp".into()), 0),
            |_, _| false,
        );
        assert_eq!(
            protocol,
            WeatherError::Protocol {
                scheme: "ftp".into()
            }
        );
    }

    #[test]
    fn test_user_messages_do_not_leak_details() {
        let error = WeatherError::Upstream {
            status: Some(401),
            attempts: 1,
        };
        assert!(!error.user_message().contains("401"));
        assert_eq!(WeatherError::NotFound.user_message(), "City not found.");
    }
}
