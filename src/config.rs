use crate::domain::entities::Source;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // API settings
    pub listen_addr: String,
    pub debug: bool,

    // Source settings
    pub sources_path: String,
    pub refresh_interval_secs: u64,
    pub refresh_after_secs: u64,

    // Checker settings
    pub check_interval_secs: u64,
    pub check_timeout_secs: u64,
    pub check_concurrency: usize,
    pub recheck_after_secs: u64,
    pub ip_endpoints: Vec<String>,

    // Liveness and cleanup settings
    pub live_window_secs: u64,
    pub sweep_interval_secs: u64,
    pub dead_after_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            debug: false,
            sources_path: "sources.toml".to_string(),
            refresh_interval_secs: 60,
            refresh_after_secs: 3600,
            check_interval_secs: 5,
            check_timeout_secs: 5,
            check_concurrency: 50,
            recheck_after_secs: 300,
            ip_endpoints: Vec::new(),
            live_window_secs: 900,
            sweep_interval_secs: 60,
            dead_after_secs: 3600,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let listen_addr = std::env::var("PROXYPOOL_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let debug = std::env::var("DEBUG").is_ok();

    let sources_path = std::env::var("PROXYPOOL_SOURCES_PATH")
        .unwrap_or_else(|_| "sources.toml".to_string());

    let refresh_interval_secs = std::env::var("PROXYPOOL_REFRESH_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);

    let refresh_after_secs = std::env::var("PROXYPOOL_REFRESH_AFTER_SECS")
        .unwrap_or_else(|_| "3600".to_string())
        .parse()
        .unwrap_or(3600);

    let check_interval_secs = std::env::var("PROXYPOOL_CHECK_INTERVAL_SECS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .unwrap_or(5);

    let check_timeout_secs = std::env::var("PROXYPOOL_CHECK_TIMEOUT_SECS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .unwrap_or(5);

    let check_concurrency = std::env::var("PROXYPOOL_CHECK_CONCURRENCY")
        .unwrap_or_else(|_| "50".to_string())
        .parse()
        .unwrap_or(50);

    let recheck_after_secs = std::env::var("PROXYPOOL_RECHECK_AFTER_SECS")
        .unwrap_or_else(|_| "300".to_string())
        .parse()
        .unwrap_or(300);

    let ip_endpoints = std::env::var("PROXYPOOL_IP_ENDPOINTS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let live_window_secs = std::env::var("PROXYPOOL_LIVE_WINDOW_SECS")
        .unwrap_or_else(|_| "900".to_string())
        .parse()
        .unwrap_or(900);

    let sweep_interval_secs = std::env::var("PROXYPOOL_SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);

    let dead_after_secs = std::env::var("PROXYPOOL_DEAD_AFTER_SECS")
        .unwrap_or_else(|_| "3600".to_string())
        .parse()
        .unwrap_or(3600);

    Ok(Config {
        listen_addr,
        debug,
        sources_path,
        refresh_interval_secs,
        refresh_after_secs,
        check_interval_secs,
        check_timeout_secs,
        check_concurrency,
        recheck_after_secs,
        ip_endpoints,
        live_window_secs,
        sweep_interval_secs,
        dead_after_secs,
    })
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<Source>,
}

/// Load and validate the source definitions from a TOML file.
pub fn load_sources(path: &Path) -> anyhow::Result<Vec<Source>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sources file {}", path.display()))?;
    let file: SourcesFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse sources file {}", path.display()))?;

    for source in &file.sources {
        source
            .validate()
            .with_context(|| format!("invalid source in {}", path.display()))?;
    }

    Ok(file.sources)
}
