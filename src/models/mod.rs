//! Data models for the weather pipeline.
//!
//! Location inputs, the canonical weather snapshots every provider is
//! normalized into, change reports, and the HTTP request/response models.

pub mod api;
pub mod change;
pub mod location;
pub mod weather;

pub use api::*;
pub use change::*;
pub use location::*;
pub use weather::*;
