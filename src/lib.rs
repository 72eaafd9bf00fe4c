//! proxy-pool Library
//!
//! This module exposes the proxy-pool components for use in integration
//! tests and as a library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{live_proxies, LiveQuery, OutputFormat, Registry};
pub use config::{load_config, load_sources};
pub use domain::entities::{CheckRecord, ProxyRecord, ResolvedEntry, Source};
pub use domain::ports::{Prober, SourceFetcher};
pub use domain::value_objects::{CheckErrorKind, Protocol, ProxyKey, ProxyStatus};
pub use infrastructure::{CheckScheduler, CleanupSweeper, ShutdownController, SourceRefresher};
