//! HTTP API
//!
//! Serves the live proxy list. Query parameters are validated strictly:
//! an unknown parameter or an invalid value is a 422 with a JSON error
//! body, never silently ignored.

use crate::application::{live_proxies, LiveQuery, OutputFormat, QueryError, Registry};
use crate::application::query::{render_json, render_text};
use crate::infrastructure::shutdown::ShutdownController;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
    /// Window since last success within which a proxy counts as live
    pub live_window: chrono::Duration,
}

/// Rejected query parameter, reported as 422.
#[derive(Debug, thiserror::Error)]
enum ParamError {
    #[error("unknown query parameter '{0}'")]
    Unknown(String),
    #[error("invalid value '{1}' for '{0}', expected a boolean")]
    InvalidBool(String, String),
    #[error(transparent)]
    Query(#[from] QueryError),
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/proxies/live", get(live_proxies_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "proxies": state.registry.len(),
    }))
}

async fn live_proxies_handler(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (query, format) = match parse_params(&params) {
        Ok(parsed) => parsed,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let records = live_proxies(
        state.registry.snapshot(),
        &query,
        Utc::now(),
        state.live_window,
    );
    tracing::debug!("served {} live proxies", records.len());

    match format {
        OutputFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            render_text(&records),
        )
            .into_response(),
        OutputFormat::Json => Json(render_json(&records)).into_response(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ParamError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ParamError::InvalidBool(key.to_string(), other.to_string())),
    }
}

fn parse_params(params: &HashMap<String, String>) -> Result<(LiveQuery, OutputFormat), ParamError> {
    let mut query = LiveQuery::default();
    let mut format = OutputFormat::default();

    for (key, value) in params {
        match key.as_str() {
            "sources" => {
                query.sources = Some(
                    value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                );
            }
            "protocol" => {
                query.protocol = Some(
                    value
                        .parse()
                        .map_err(|_| QueryError::InvalidProtocol(value.clone()))?,
                );
            }
            "unique_ip" => query.unique_ip = parse_bool(key, value)?,
            "exclude_gateway" => query.exclude_gateway = parse_bool(key, value)?,
            "format" => format = value.parse()?,
            other => return Err(ParamError::Unknown(other.to_string())),
        }
    }

    Ok((query, format))
}

/// The HTTP server wrapping the router, stopping on shutdown.
pub struct ApiServer {
    state: ApiState,
    listen_addr: SocketAddr,
    shutdown: ShutdownController,
}

impl ApiServer {
    pub fn new(state: ApiState, listen_addr: SocketAddr, shutdown: ShutdownController) -> Self {
        Self {
            state,
            listen_addr,
            shutdown,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;
        tracing::info!("api listening on {}", self.listen_addr);

        let mut shutdown_rx = self.shutdown.subscribe();
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("api server stopping");
            })
            .await?;
        Ok(())
    }
}
