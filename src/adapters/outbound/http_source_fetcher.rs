//! HTTP Source Fetcher
//!
//! Resolves a source into proxy entries: the inline `entries` list plus,
//! when the source names an `entries_url`, the line-per-proxy body fetched
//! from it. Malformed lines are skipped with a warning rather than failing
//! the whole source.

use crate::domain::entities::{ResolvedEntry, Source};
use crate::domain::ports::{FetchError, SourceFetcher};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const FETCH_TIMEOUT_SECS: u64 = 10;

/// Fetcher backed by a shared reqwest client.
pub struct HttpSourceFetcher {
    client: Client,
}

impl HttpSourceFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Resolve a batch of raw lines, skipping the unusable ones.
    fn resolve_lines<'a>(
        source: &Source,
        lines: impl Iterator<Item = &'a str>,
    ) -> Vec<ResolvedEntry> {
        let mut resolved = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match source.resolve_entry(line) {
                Ok(entry) => resolved.push(entry),
                Err(e) => {
                    tracing::warn!("skipping entry from source '{}': {}", source.id, e);
                }
            }
        }
        resolved
    }

    async fn fetch_url(&self, source: &Source, url: &str) -> Result<Vec<ResolvedEntry>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::resolve_lines(source, body.lines()))
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    /// Inline entries always resolve. A failing `entries_url` is an error
    /// only when the source has no inline entries to fall back on;
    /// otherwise the inline entries are returned and the failure logged.
    async fn fetch(&self, source: &Source) -> Result<Vec<ResolvedEntry>, FetchError> {
        let mut entries = Self::resolve_lines(source, source.entries.iter().map(|s| s.as_str()));

        if let Some(url) = source.entries_url.as_deref().filter(|u| !u.trim().is_empty()) {
            match self.fetch_url(source, url).await {
                Ok(fetched) => {
                    tracing::debug!(
                        "source '{}' listed {} entries at {}",
                        source.id,
                        fetched.len(),
                        url
                    );
                    entries.extend(fetched);
                }
                Err(e) if entries.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!("source '{}' url fetch failed, keeping inline entries: {}", source.id, e);
                }
            }
        }

        Ok(entries)
    }
}
