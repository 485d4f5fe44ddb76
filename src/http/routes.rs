use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::{TelemetryEvent, TiltEngine};
use crate::error::SubscriptionError;
use crate::indicator::IndicatorSnapshot;
use crate::sensor::{RateHint, SourceStats};
use crate::telemetry::{self, TelemetrySnapshot};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub engine: &'static TiltEngine,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn new(engine: &'static TiltEngine, token: String) -> Self {
        Self {
            engine,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    BadRequest(&'static str),
    ServiceUnavailable(&'static str),
    Internal(String),
}

impl From<SubscriptionError> for HttpServerError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::SensorUnavailable => {
                Self::ServiceUnavailable("accelerometer unavailable")
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.into()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub source_active: bool,
    pub host_active: bool,
    pub sink_count: usize,
    pub effective_rate: Option<RateHint>,
    pub backend: String,
    pub uptime_ms: u64,
}

/// Telemetry endpoint response payload.
#[derive(Debug, Serialize)]
pub struct TelemetryResponse {
    pub latest_event: Option<TelemetryEvent>,
    pub stats: SourceStats,
    pub samples_seen: u64,
    pub diagnostics: TelemetrySnapshot,
}

/// Lifecycle command payload.
#[derive(Debug, Deserialize)]
pub struct LifecycleCommand {
    pub action: String,
}

/// Lifecycle acknowledgement payload.
#[derive(Debug, Serialize)]
pub struct LifecycleAck {
    pub host_active: bool,
    pub source_active: bool,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/telemetry", get(telemetry_handler))
        .route("/indicator", get(indicator))
        .route("/sample-stream", get(sample_stream_handler))
        .route("/lifecycle", post(lifecycle))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let source = state.engine.source();
    Ok(Json(HealthResponse {
        status: "ok",
        source_active: source.is_active(),
        host_active: state.engine.is_host_active(),
        sink_count: source.sink_count(),
        effective_rate: source.effective_rate(),
        backend: source.backend_name().to_string(),
        uptime_ms: state.engine.uptime_ms(),
    }))
}

pub async fn telemetry_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<TelemetryResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let hub = telemetry::hub();

    Ok(Json(TelemetryResponse {
        latest_event: state.engine.latest_event(),
        stats: state.engine.stats(),
        samples_seen: hub.samples_seen(),
        diagnostics: hub.snapshot(),
    }))
}

pub async fn indicator(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<IndicatorSnapshot>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.engine.indicator_snapshot()))
}

pub async fn sample_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::SampleStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    sse::samples(state.engine)
}

pub async fn lifecycle(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(command): Json<LifecycleCommand>,
) -> Result<Json<LifecycleAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    match command.action.as_str() {
        "activate" => state.engine.activate()?,
        "deactivate" => state.engine.deactivate()?,
        _ => {
            return Err(HttpServerError::BadRequest(
                "action must be \"activate\" or \"deactivate\"",
            ))
        }
    }

    Ok(Json(LifecycleAck {
        host_active: state.engine.is_host_active(),
        source_active: state.engine.is_active(),
    }))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}
