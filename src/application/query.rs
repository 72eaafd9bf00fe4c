//! Live Query Engine
//!
//! Filters and aggregates a registry snapshot into the set of
//! currently-usable proxies, and renders it for the API.

use crate::domain::entities::ProxyRecord;
use crate::domain::value_objects::{Protocol, ProxyStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Invalid query parameter value, reported to the caller as a client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid protocol '{0}', expected 'http' or 'socks5'")]
    InvalidProtocol(String),
    #[error("invalid format '{0}', expected 'text' or 'json'")]
    InvalidFormat(String),
}

/// Response rendering for the live proxies endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(QueryError::InvalidFormat(other.to_string())),
        }
    }
}

/// Caller filters for the live set.
#[derive(Debug, Clone, Default)]
pub struct LiveQuery {
    /// Keep proxies whose source set intersects these ids.
    pub sources: Option<Vec<String>>,
    /// Keep proxies with exactly this protocol.
    pub protocol: Option<Protocol>,
    /// One representative per distinct external IP.
    pub unique_ip: bool,
    /// Drop proxies whose detected exit IP differs from their host.
    pub exclude_gateway: bool,
}

/// Apply the live predicate and the query filters to a snapshot.
///
/// A proxy is live when its status is ok and its last success is within
/// `live_window` of `now` (inclusive boundary). Output is ordered by
/// canonical identity.
pub fn live_proxies(
    snapshot: Vec<ProxyRecord>,
    query: &LiveQuery,
    now: DateTime<Utc>,
    live_window: Duration,
) -> Vec<ProxyRecord> {
    let mut live: Vec<ProxyRecord> = snapshot
        .into_iter()
        .filter(|r| {
            r.status == ProxyStatus::Ok
                && r.last_success_at.map_or(false, |ok_at| now - ok_at <= live_window)
        })
        .filter(|r| match &query.sources {
            Some(wanted) => wanted.iter().any(|s| r.sources.contains(s)),
            None => true,
        })
        .filter(|r| match query.protocol {
            Some(protocol) => r.key.protocol == protocol,
            None => true,
        })
        .filter(|r| !query.exclude_gateway || r.is_gateway() == Some(false))
        .collect();

    live.sort_by(|a, b| a.key.cmp(&b.key));

    if query.unique_ip {
        live = dedup_by_external_ip(live);
    }

    live
}

/// Keep one representative per distinct external IP: the most recently
/// checked proxy wins, ties broken by canonical identity order.
///
/// Records with no detected external IP cannot collide and pass through.
fn dedup_by_external_ip(records: Vec<ProxyRecord>) -> Vec<ProxyRecord> {
    let mut by_ip: BTreeMap<String, ProxyRecord> = BTreeMap::new();
    let mut without_ip = Vec::new();

    // Records arrive in key order, so on a latency tie the smaller key is
    // already in place.
    for record in records {
        match record.last_external_ip.clone() {
            None => without_ip.push(record),
            Some(ip) => match by_ip.get(&ip) {
                Some(kept) if kept.last_checked_at >= record.last_checked_at => {}
                _ => {
                    by_ip.insert(ip, record);
                }
            },
        }
    }

    let mut result: Vec<ProxyRecord> = by_ip.into_values().chain(without_ip).collect();
    result.sort_by(|a, b| a.key.cmp(&b.key));
    result
}

/// One proxy URL per line.
pub fn render_text(records: &[ProxyRecord]) -> String {
    records
        .iter()
        .map(|r| r.url())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{"proxies": [url, ...]}`.
pub fn render_json(records: &[ProxyRecord]) -> serde_json::Value {
    let urls: Vec<String> = records.iter().map(|r| r.url()).collect();
    serde_json::json!({ "proxies": urls })
}
