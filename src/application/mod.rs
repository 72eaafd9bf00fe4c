//! Application Layer
//!
//! The registry (shared mutable state) and the live query engine.

pub mod query;
pub mod registry;

pub use query::{live_proxies, LiveQuery, OutputFormat, QueryError};
pub use registry::Registry;
