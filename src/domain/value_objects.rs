//! Domain Value Objects
//!
//! Small immutable types shared across the engine: proxy protocol,
//! canonical proxy identity, health status, and check failure kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Socks5,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized protocol strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol '{0}', expected 'http' or 'socks5'")]
pub struct ParseProtocolError(pub String);

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // https proxies are dialed the same way as http ones
            "http" | "https" => Ok(Protocol::Http),
            "socks5" => Ok(Protocol::Socks5),
            other => Err(ParseProtocolError(other.to_string())),
        }
    }
}

/// Canonical proxy identity: `(protocol, host, port, username)`.
///
/// Two entries with the same key refer to the same proxy regardless of
/// which source reported them. The derived ordering (protocol, then host,
/// then port, then username) is the deterministic output order of the
/// query API.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProxyKey {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// None for anonymous proxies.
    pub username: Option<String>,
}

impl ProxyKey {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// `host:port` endpoint form, used in logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyKey {
    /// Identity without credentials; the full URL (with password) is
    /// rendered by `ProxyRecord::url`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Proxy health status derived from the most recent check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    /// Never checked since creation.
    Unchecked,
    /// Most recent check succeeded.
    Ok,
    /// Most recent check failed.
    Failing,
}

/// Why a check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckErrorKind {
    /// The probe exceeded its hard timeout.
    Timeout,
    /// The connection through the proxy could not be established.
    ConnectFailed,
    /// Non-2xx status or a body that is not an IP address.
    BadResponse,
}

impl fmt::Display for CheckErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckErrorKind::Timeout => "timeout",
            CheckErrorKind::ConnectFailed => "connect_failed",
            CheckErrorKind::BadResponse => "bad_response",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("https".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("socks5".parse::<Protocol>().unwrap(), Protocol::Socks5);
        assert!("socks4".parse::<Protocol>().is_err());
        assert!("".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Http.to_string(), "http");
        assert_eq!(Protocol::Socks5.to_string(), "socks5");
    }

    #[test]
    fn test_proxy_key_equality() {
        let a = ProxyKey::new(Protocol::Socks5, "1.2.3.4", 1080);
        let b = ProxyKey::new(Protocol::Socks5, "1.2.3.4", 1080);
        let c = ProxyKey::new(Protocol::Http, "1.2.3.4", 1080);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_proxy_key_username_distinguishes() {
        let anon = ProxyKey::new(Protocol::Socks5, "1.2.3.4", 1080);
        let named = ProxyKey::new(Protocol::Socks5, "1.2.3.4", 1080).with_username("u");

        assert_ne!(anon, named);
    }

    #[test]
    fn test_proxy_key_hash_consistency() {
        use std::collections::HashSet;

        let a = ProxyKey::new(Protocol::Http, "10.0.0.1", 3128).with_username("u");
        let b = ProxyKey::new(Protocol::Http, "10.0.0.1", 3128).with_username("u");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_proxy_key_ordering_is_deterministic() {
        let mut keys = vec![
            ProxyKey::new(Protocol::Socks5, "2.2.2.2", 1080),
            ProxyKey::new(Protocol::Http, "1.1.1.1", 8080),
            ProxyKey::new(Protocol::Http, "1.1.1.1", 80),
        ];
        keys.sort();

        assert_eq!(keys[0].port, 80);
        assert_eq!(keys[1].port, 8080);
        assert_eq!(keys[2].protocol, Protocol::Socks5);
    }

    #[test]
    fn test_endpoint() {
        let key = ProxyKey::new(Protocol::Http, "192.168.1.1", 8080);
        assert_eq!(key.endpoint(), "192.168.1.1:8080");
    }

    #[test]
    fn test_check_error_kind_display() {
        assert_eq!(CheckErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(CheckErrorKind::ConnectFailed.to_string(), "connect_failed");
        assert_eq!(CheckErrorKind::BadResponse.to_string(), "bad_response");
    }
}
