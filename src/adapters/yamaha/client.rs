//! Yamaha Extended Control (YXC) HTTP client
//!
//! Every call is a plain GET against `http://<host>/YamahaExtendedControl/v1/<path>`
//! returning a JSON object with a `response_code` (0 = success).

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const API_ROOT: &str = "YamahaExtendedControl/v1";

/// Zone used for every zone-scoped call (multi-zone is not modelled)
pub const MAIN_ZONE: &str = "main";

pub const RESPONSE_OK: i64 = 0;

#[derive(Debug, Error)]
pub enum YamahaError {
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP status {status}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
    },
    #[error("{path} returned a malformed body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} returned response_code {code}")]
    ResponseCode { path: String, code: i64 },
}

pub type Result<T> = std::result::Result<T, YamahaError>;

// =============================================================================
// Wire models
// =============================================================================

/// Bare acknowledgement returned by setter calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_code: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub response_code: i64,
    pub model_name: String,
    pub destination: String,
    pub device_id: String,
    pub system_id: String,
    pub system_version: f64,
    pub api_version: f64,
    pub netmodule_version: String,
    pub serial_number: String,
    pub operation_mode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub response_code: i64,
    pub system: SystemFeatures,
    pub zone: Vec<ZoneFeatures>,
}

impl Features {
    pub fn zone(&self, id: &str) -> Option<&ZoneFeatures> {
        self.zone.iter().find(|z| z.id == id)
    }

    /// Input ids advertised at system level, in device order
    pub fn input_ids(&self) -> Vec<String> {
        self.system.input_list.iter().map(|i| i.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemFeatures {
    pub func_list: Vec<String>,
    pub zone_num: u32,
    pub input_list: Vec<InputEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputEntry {
    pub id: String,
    pub distribution_enable: bool,
    pub rename_enable: bool,
    pub account_enable: bool,
    pub play_info_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneFeatures {
    pub id: String,
    pub func_list: Vec<String>,
    pub input_list: Vec<String>,
    pub range_step: Vec<RangeStep>,
}

impl ZoneFeatures {
    pub fn range_step(&self, id: &str) -> Option<&RangeStep> {
        self.range_step.iter().find(|r| r.id == id)
    }
}

/// Some ranges (actual_volume in dB) are fractional, so these stay floats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeStep {
    pub id: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub response_code: i64,
    /// "on" or "standby"
    pub power: String,
    pub sleep: i64,
    pub volume: i64,
    pub mute: bool,
    pub max_volume: i64,
    pub input: String,
    pub input_text: String,
    pub sound_program: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayInfo {
    pub response_code: i64,
    pub input: String,
    pub playback: String,
    pub repeat: String,
    pub shuffle: String,
    pub play_time: i64,
    pub total_time: i64,
    pub artist: String,
    pub album: String,
    pub track: String,
    pub albumart_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    On,
    Standby,
    Toggle,
}

impl Power {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Standby => "standby",
            Self::Toggle => "toggle",
        }
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Standby
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Play,
    Pause,
    Previous,
    Next,
}

impl Playback {
    pub const ALL: [Playback; 4] = [Self::Play, Self::Pause, Self::Previous, Self::Next];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Previous => "previous",
            Self::Next => "next",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// Control channel to one receiver
#[derive(Debug, Clone)]
pub struct YamahaClient {
    http: Client,
    host: String,
}

impl YamahaClient {
    /// `host` is a bare host or `host:port` (IPv6 hosts bracketed)
    pub fn new(http: Client, host: impl Into<String>) -> Self {
        Self {
            http,
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}/{}", self.host, API_ROOT, path)
    }

    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        self.get("system/getDeviceInfo").await
    }

    pub async fn get_features(&self) -> Result<Features> {
        self.get("system/getFeatures").await
    }

    pub async fn get_status(&self, zone: &str) -> Result<Status> {
        self.get(&format!("{}/getStatus", zone)).await
    }

    pub async fn set_power(&self, power: Power, zone: &str) -> Result<CommandResponse> {
        self.get(&format!("{}/setPower?power={}", zone, power)).await
    }

    pub async fn set_volume(&self, volume: i64, zone: &str) -> Result<CommandResponse> {
        self.get(&format!("{}/setVolume?volume={}", zone, volume))
            .await
    }

    pub async fn set_input(&self, input: &str, zone: &str) -> Result<CommandResponse> {
        self.get(&format!(
            "{}/setInput?input={}&mode=autoplay_disabled",
            zone,
            urlencoding::encode(input)
        ))
        .await
    }

    pub async fn get_play_info(&self) -> Result<PlayInfo> {
        self.get("netusb/getPlayInfo").await
    }

    pub async fn set_playback(&self, playback: Playback) -> Result<CommandResponse> {
        self.get(&format!("netusb/setPlayback?playback={}", playback))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| YamahaError::Http {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(YamahaError::Status {
                path: path.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|source| YamahaError::Http {
            path: path.to_string(),
            source,
        })?;

        decode_body(path, &body)
    }
}

/// Decode a YXC body, surfacing a non-zero `response_code` as an error.
fn decode_body<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T> {
    let decode_err = |source| YamahaError::Decode {
        path: path.to_string(),
        source,
    };

    let value: serde_json::Value = serde_json::from_slice(body).map_err(decode_err)?;
    let code = value
        .get("response_code")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| decode_err(serde::de::Error::missing_field("response_code")))?;

    if code != RESPONSE_OK {
        return Err(YamahaError::ResponseCode {
            path: path.to_string(),
            code,
        });
    }

    serde_json::from_value(value).map_err(decode_err)
}
