//! Custom middleware implementations for the API.
//!
//! Request IDs with lifecycle logging, and HTTP metrics collection.

pub mod metrics;
pub mod request_id;

pub use metrics::*;
pub use request_id::*;
