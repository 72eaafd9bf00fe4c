//! Domain Ports
//!
//! Interfaces at the engine's seams. Implementations live in the adapters
//! and infrastructure layers; tests substitute stubs.

use crate::domain::entities::{CheckRecord, ResolvedEntry, Source};
use async_trait::async_trait;

/// Error raised while collecting entries for a source.
///
/// Always local to one source's refresh cycle; never aborts ingestion.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("{url} returned status {status}")]
    BadStatus { url: String, status: u16 },
}

/// Ingestion boundary: turns a source definition into resolved proxy
/// entries ready for registry upsert.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<ResolvedEntry>, FetchError>;
}

/// One verification probe against one proxy.
///
/// Takes the full proxy URL (`protocol://[user:pass@]host:port`), dials
/// through it, and reports the outcome. Never touches the registry.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, proxy_url: &str) -> CheckRecord;
}
