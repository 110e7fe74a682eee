//! HTTP API handlers

use crate::adapters::yamaha::{DeviceSession, DeviceView, SessionError, YamahaAdapter};
use crate::bus::{ActionRecord, PropertyName, PropertyValue, SharedBus};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub yamaha: Arc<YamahaAdapter>,
    pub bus: SharedBus,
    started: Instant,
}

impl AppState {
    pub fn new(yamaha: Arc<YamahaAdapter>, bus: SharedBus) -> Self {
        Self {
            yamaha,
            bus,
            started: Instant::now(),
        }
    }

    async fn session(&self, device_id: &str) -> Result<Arc<DeviceSession>, ApiError> {
        self.yamaha
            .registry()
            .find(device_id)
            .await
            .ok_or_else(|| ApiError::not_found(format!("Device not found: {}", device_id)))
    }
}

/// Build the API router. Routes are pinned by tests/fixtures/api_routes.txt.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/status", get(status_handler))
        // Devices
        .route("/devices", get(devices_handler))
        .route("/devices/{id}", get(device_handler))
        .route("/devices/{id}/properties/{name}", put(set_property_handler))
        .route("/devices/{id}/actions/{name}", post(action_handler))
        // Event stream (SSE)
        .route("/events", get(events_handler))
        .with_state(state)
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub git_sha: &'static str,
    pub uptime_secs: u64,
    pub discovery_running: bool,
    pub devices: usize,
    pub bus_subscribers: usize,
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "yamaha-bridge",
        version: env!("YAMAHA_BRIDGE_VERSION"),
        git_sha: env!("YAMAHA_BRIDGE_GIT_SHA"),
        uptime_secs: state.started.elapsed().as_secs(),
        discovery_running: state.yamaha.is_running(),
        devices: state.yamaha.registry().len().await,
        bus_subscribers: state.bus.subscriber_count(),
    })
}

// =============================================================================
// Device handlers
// =============================================================================

/// GET /devices - All known receivers with their cached state
pub async fn devices_handler(State(state): State<AppState>) -> Json<Vec<DeviceView>> {
    let mut views = Vec::new();
    for session in state.yamaha.registry().sessions().await {
        views.push(session.view().await);
    }
    Json(views)
}

/// GET /devices/{id} - One receiver
pub async fn device_handler(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceView>, ApiError> {
    let session = state.session(&device_id).await?;
    Ok(Json(session.view().await))
}

#[derive(Deserialize)]
pub struct SetPropertyRequest {
    pub value: PropertyValue,
}

/// PUT /devices/{id}/properties/{name} - Set a writable property
pub async fn set_property_handler(
    State(state): State<AppState>,
    Path((device_id, name)): Path<(String, String)>,
    Json(req): Json<SetPropertyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(&device_id).await?;
    let property: PropertyName = name.parse().map_err(ApiError::bad_request)?;
    let outcome = session.set_property(property, req.value).await?;
    Ok(Json(outcome))
}

/// POST /devices/{id}/actions/{name} - Run a playback action
pub async fn action_handler(
    State(state): State<AppState>,
    Path((device_id, name)): Path<(String, String)>,
) -> Result<Json<ActionRecord>, ApiError> {
    let session = state.session(&device_id).await?;
    Ok(Json(session.perform_action(&name).await))
}

// =============================================================================
// Event stream
// =============================================================================

/// GET /events - Server-sent events from the bus
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
            Err(_) => None,
        },
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
