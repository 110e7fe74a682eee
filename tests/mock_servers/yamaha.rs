//! Mock Yamaha receiver for testing
//!
//! Simulates the Extended Control HTTP API under /YamahaExtendedControl/v1
//! and serves a UPnP description document at /description.xml.

use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub const EXTENDED_CONTROL_MARKER: &str =
    "urn:schemas-yamaha-com:service:X_YamahaExtendedControl:1";

/// Description document with the given extra service type
pub fn description_xml(service_type: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Living Room</friendlyName>
    <manufacturer>Yamaha Corporation</manufacturer>
    <serviceList>
      <service>
        <serviceType>{}</serviceType>
      </service>
    </serviceList>
  </device>
</root>"#,
        service_type
    )
}

/// Mock receiver state
struct MockYamahaState {
    device_id: String,
    model_name: String,
    /// `None` answers the description request with 404
    description: Option<String>,
    power: String,
    volume: i64,
    input: String,
    track: String,
    album: String,
    artist: String,
    playback: String,
    fail_status: bool,
    fail_features: bool,
    /// Added latency on every getStatus answer
    status_delay: Duration,
    status_in_flight: usize,
    max_status_in_flight: usize,
    /// Non-zero response_code returned by every set* command
    command_response_code: i64,
    /// Path and query of every Extended Control request, in arrival order
    requests: Vec<String>,
}

/// Mock Yamaha Receiver
pub struct MockYamahaReceiver {
    addr: SocketAddr,
    state: Arc<RwLock<MockYamahaState>>,
    handle: JoinHandle<()>,
}

type SharedState = Arc<RwLock<MockYamahaState>>;

impl MockYamahaReceiver {
    /// Start a mock receiver on a random port
    pub async fn start(device_id: &str) -> Self {
        let state = Arc::new(RwLock::new(MockYamahaState {
            device_id: device_id.to_string(),
            model_name: "RX-V685".to_string(),
            description: Some(description_xml(EXTENDED_CONTROL_MARKER)),
            power: "on".to_string(),
            volume: 100,
            input: "hdmi1".to_string(),
            track: "So What".to_string(),
            album: "Kind of Blue".to_string(),
            artist: "Miles Davis".to_string(),
            playback: "stop".to_string(),
            fail_status: false,
            fail_features: false,
            status_delay: Duration::ZERO,
            status_in_flight: 0,
            max_status_in_flight: 0,
            command_response_code: 0,
            requests: Vec::new(),
        }));

        let app = Router::new()
            .route("/description.xml", get(handle_description))
            .route(
                "/YamahaExtendedControl/v1/system/getDeviceInfo",
                get(handle_device_info),
            )
            .route(
                "/YamahaExtendedControl/v1/system/getFeatures",
                get(handle_features),
            )
            .route("/YamahaExtendedControl/v1/main/getStatus", get(handle_status))
            .route(
                "/YamahaExtendedControl/v1/netusb/getPlayInfo",
                get(handle_play_info),
            )
            .route("/YamahaExtendedControl/v1/main/setPower", get(handle_set_power))
            .route(
                "/YamahaExtendedControl/v1/main/setVolume",
                get(handle_set_volume),
            )
            .route("/YamahaExtendedControl/v1/main/setInput", get(handle_set_input))
            .route(
                "/YamahaExtendedControl/v1/netusb/setPlayback",
                get(handle_set_playback),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port` as passed to the Extended Control client
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// LOCATION URL of the description document
    pub fn location(&self) -> String {
        format!("http://{}/description.xml", self.addr)
    }

    /// Replace the description document (`None` answers 404)
    pub async fn set_description(&self, description: Option<String>) {
        self.state.write().await.description = description;
    }

    pub async fn set_power(&self, power: &str) {
        self.state.write().await.power = power.to_string();
    }

    pub async fn set_track(&self, track: &str) {
        self.state.write().await.track = track.to_string();
    }

    pub async fn set_fail_status(&self, fail: bool) {
        self.state.write().await.fail_status = fail;
    }

    pub async fn set_fail_features(&self, fail: bool) {
        self.state.write().await.fail_features = fail;
    }

    pub async fn set_status_delay(&self, delay: Duration) {
        self.state.write().await.status_delay = delay;
    }

    /// Most getStatus requests ever being answered at the same time
    pub async fn max_concurrent_status(&self) -> usize {
        self.state.read().await.max_status_in_flight
    }

    pub async fn set_command_response_code(&self, code: i64) {
        self.state.write().await.command_response_code = code;
    }

    pub async fn volume(&self) -> i64 {
        self.state.read().await.volume
    }

    pub async fn power(&self) -> String {
        self.state.read().await.power.clone()
    }

    /// Every Extended Control request received so far
    pub async fn requests(&self) -> Vec<String> {
        self.state.read().await.requests.clone()
    }

    /// Number of requests whose path ends with `endpoint`
    pub async fn request_count(&self, endpoint: &str) -> usize {
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.split('?').next().unwrap_or_default().ends_with(endpoint))
            .count()
    }

    /// Stop the server
    pub fn stop(self) {
        self.handle.abort();
    }
}

fn ok_body(mut body: Value) -> Json<Value> {
    body["response_code"] = json!(0);
    Json(body)
}

async fn record(state: &SharedState, uri: &Uri) {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    state.write().await.requests.push(path);
}

async fn handle_description(State(state): State<SharedState>) -> impl IntoResponse {
    match state.read().await.description.clone() {
        Some(xml) => (StatusCode::OK, xml).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn handle_device_info(State(state): State<SharedState>, uri: Uri) -> Json<Value> {
    record(&state, &uri).await;
    let s = state.read().await;
    ok_body(json!({
        "model_name": s.model_name,
        "destination": "BG",
        "device_id": s.device_id,
        "system_id": "0B587073",
        "system_version": 2.54,
        "api_version": 2.08,
        "netmodule_version": "2052",
        "operation_mode": "normal",
    }))
}

async fn handle_features(State(state): State<SharedState>, uri: Uri) -> impl IntoResponse {
    record(&state, &uri).await;
    if state.read().await.fail_features {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ok_body(json!({
        "system": {
            "func_list": ["wired_lan", "wireless_lan"],
            "zone_num": 1,
            "input_list": [
                {"id": "hdmi1", "distribution_enable": false, "play_info_type": "none"},
                {"id": "tuner", "distribution_enable": true, "play_info_type": "tuner"},
                {"id": "spotify", "distribution_enable": true, "play_info_type": "netusb"},
            ],
        },
        "zone": [{
            "id": "main",
            "func_list": ["power", "volume", "mute"],
            "input_list": ["hdmi1", "tuner", "spotify"],
            "range_step": [
                {"id": "volume", "min": 0, "max": 161, "step": 1},
            ],
        }],
    }))
    .into_response()
}

async fn handle_status(State(state): State<SharedState>, uri: Uri) -> impl IntoResponse {
    record(&state, &uri).await;
    let delay = {
        let mut s = state.write().await;
        s.status_in_flight += 1;
        s.max_status_in_flight = s.max_status_in_flight.max(s.status_in_flight);
        s.status_delay
    };
    tokio::time::sleep(delay).await;
    state.write().await.status_in_flight -= 1;

    let s = state.read().await;
    if s.fail_status {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ok_body(json!({
        "power": s.power,
        "sleep": 0,
        "volume": s.volume,
        "mute": false,
        "max_volume": 161,
        "input": s.input,
        "input_text": s.input.to_uppercase(),
        "sound_program": "straight",
    }))
    .into_response()
}

async fn handle_play_info(State(state): State<SharedState>, uri: Uri) -> Json<Value> {
    record(&state, &uri).await;
    let s = state.read().await;
    ok_body(json!({
        "input": "spotify",
        "playback": s.playback,
        "repeat": "off",
        "shuffle": "off",
        "play_time": 42,
        "total_time": 545,
        "artist": s.artist,
        "album": s.album,
        "track": s.track,
        "albumart_url": "",
    }))
}

/// Shared body of every set* endpoint
async fn command(
    state: &SharedState,
    uri: &Uri,
    apply: impl FnOnce(&mut MockYamahaState),
) -> Json<Value> {
    record(state, uri).await;
    let mut s = state.write().await;
    if s.command_response_code != 0 {
        return Json(json!({ "response_code": s.command_response_code }));
    }
    apply(&mut s);
    Json(json!({ "response_code": 0 }))
}

async fn handle_set_power(
    State(state): State<SharedState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    command(&state, &uri, |s| {
        match params.get("power").map(String::as_str) {
            Some("toggle") => {
                s.power = if s.power == "on" { "standby" } else { "on" }.to_string()
            }
            Some(power) => s.power = power.to_string(),
            None => {}
        }
    })
    .await
}

async fn handle_set_volume(
    State(state): State<SharedState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    command(&state, &uri, |s| {
        if let Some(volume) = params.get("volume").and_then(|v| v.parse().ok()) {
            s.volume = volume;
        }
    })
    .await
}

async fn handle_set_input(
    State(state): State<SharedState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    command(&state, &uri, |s| {
        if let Some(input) = params.get("input") {
            s.input = input.clone();
        }
    })
    .await
}

async fn handle_set_playback(
    State(state): State<SharedState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    command(&state, &uri, |s| {
        if let Some(playback) = params.get("playback") {
            s.playback = playback.clone();
        }
    })
    .await
}
