//! HTTP surface of the node: aggregated health and a bus ingress bridge for
//! external producers such as the scanner and the agent registry.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use vigil_core::{
    bus::MessageBus,
    health::{HealthReport, HealthReporter, HealthStatus},
};
use vigil_model::subjects;

use crate::errors::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    bus: Arc<dyn MessageBus>,
    reporters: Vec<Arc<dyn HealthReporter>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reporters: Vec<&str> =
            self.reporters.iter().map(|r| r.name()).collect();
        f.debug_struct("AppState")
            .field("reporters", &reporters)
            .finish()
    }
}

impl AppState {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            reporters: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub components: BTreeMap<String, Vec<HealthReport>>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/bus/{subject}", post(publish_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let components: BTreeMap<String, Vec<HealthReport>> = state
        .reporters
        .iter()
        .map(|reporter| (reporter.name().to_string(), reporter.health()))
        .collect();

    let unhealthy = components
        .values()
        .flatten()
        .any(|report| report.status == HealthStatus::Error);

    let body = HealthResponse {
        status: if unhealthy { "unhealthy" } else { "healthy" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        components,
    };

    let status = if unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body))
}

/// Forwards a JSON body onto the bus under one of the node's subjects.
async fn publish_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    if !subjects::all().iter().any(|known| *known == subject) {
        return Err(ApiError::not_found(format!("unknown subject '{subject}'")));
    }

    if let Err(err) = serde_json::from_slice::<Value>(&body) {
        warn!(target: "server", subject = %subject, error = %err, "rejected non-JSON bus payload");
        return Err(ApiError::bad_request(format!("payload is not JSON: {err}")));
    }

    state.bus.publish_bytes(&subject, body.to_vec()).await?;
    debug!(target: "server", subject = %subject, bytes = body.len(), "bus payload accepted");
    Ok(StatusCode::ACCEPTED)
}
