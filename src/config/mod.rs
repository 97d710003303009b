//! Configuration structures and loading utilities.
//!
//! Every concern loads itself from environment variables with a `from_env`
//! constructor and falls back to defaults for anything unset or unparsable.

pub mod change_detection;
pub mod metrics;
pub mod pipeline;
pub mod retry;

pub use change_detection::*;
pub use metrics::*;
pub use pipeline::*;

/// Serializes tests that modify environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
