//! Utility functions and helper modules.
//!
//! Route labelling for metrics and credential masking for logs.

pub mod redact;
pub mod route;

pub use redact::*;
pub use route::*;
