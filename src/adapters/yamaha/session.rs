//! One live receiver: cached property state, host notifications, and command dispatch.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::client::{
    CommandResponse, DeviceInfo, Features, PlayInfo, Playback, Power, Status, YamahaClient,
    MAIN_ZONE,
};
use super::properties::{
    describe_properties, Extractor, PropertyTable, VolumeRange, PLAY_INFO_PROPERTIES,
    STATUS_PROPERTIES,
};
use crate::adapters::DeviceHost;
use crate::bus::{
    ActionDescription, ActionRecord, DeviceDescription, PropertyName, PropertyState,
    PropertyValue,
};

/// Prefix of host-facing device ids
pub const DEVICE_ID_PREFIX: &str = "yamaha-";

/// Rejections of a host write before anything reaches the device
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("property {0} is read-only")]
    ReadOnly(PropertyName),
    #[error("property {property} expects a {expected} value, got {value}")]
    InvalidValue {
        property: PropertyName,
        expected: &'static str,
        value: PropertyValue,
    },
    #[error("device has no property {0}")]
    UnknownProperty(PropertyName),
}

/// Result of pushing a command to the receiver. Failures are logged, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "lowercase")]
pub enum CommandOutcome {
    Accepted,
    Failed(String),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Snapshot of a session for the host API
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    #[serde(flatten)]
    pub description: DeviceDescription,
    pub state: Vec<PropertyState>,
}

pub struct DeviceSession {
    identity: String,
    description: DeviceDescription,
    client: YamahaClient,
    properties: RwLock<PropertyTable>,
    host: Arc<dyn DeviceHost>,
}

impl DeviceSession {
    pub fn new(
        client: YamahaClient,
        info: &DeviceInfo,
        features: &Features,
        host: Arc<dyn DeviceHost>,
    ) -> Self {
        let volume = VolumeRange::from_features(features);
        let inputs = features.input_ids();

        let description = DeviceDescription {
            id: format!("{}{}", DEVICE_ID_PREFIX, info.device_id),
            name: info.device_id.clone(),
            model: info.model_name.clone(),
            address: client.host().to_string(),
            capabilities: vec!["MultiLevelSwitch".to_string()],
            properties: describe_properties(volume, &inputs),
            actions: playback_actions(),
        };

        Self {
            identity: info.device_id.clone(),
            description,
            client,
            properties: RwLock::new(PropertyTable::new()),
            host,
        }
    }

    /// Vendor-assigned device_id
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Host-facing id (`yamaha-<device_id>`)
    pub fn id(&self) -> &str {
        &self.description.id
    }

    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    pub fn client(&self) -> &YamahaClient {
        &self.client
    }

    pub async fn value(&self, name: PropertyName) -> Option<PropertyValue> {
        self.properties.read().await.get(name).cloned()
    }

    pub async fn view(&self) -> DeviceView {
        let state = self.properties.read().await.states();
        DeviceView {
            description: self.description.clone(),
            state,
        }
    }

    // =========================================================================
    // Poll application
    // =========================================================================

    /// Apply a status snapshot to power/volume/input. Returns the number of notifications.
    pub async fn update_status(&self, status: &Status) -> usize {
        self.update(status, &STATUS_PROPERTIES).await
    }

    /// Apply a play-info snapshot to track/album/artist. Returns the number of notifications.
    pub async fn update_play_info(&self, info: &PlayInfo) -> usize {
        self.update(info, &PLAY_INFO_PROPERTIES).await
    }

    /// Notifications go out while the table is still locked, so the host sees
    /// changes in the order they were applied to the cache.
    async fn update<S>(&self, snapshot: &S, extractors: &[(PropertyName, Extractor<S>)]) -> usize {
        let mut table = self.properties.write().await;
        let changes = table.apply_snapshot(snapshot, extractors);

        for (name, value) in &changes {
            debug!("{} / {} -> {}", self.identity, name, value);
            self.host.property_changed(self.id(), *name, value);
        }
        changes.len()
    }

    // =========================================================================
    // Host writes
    // =========================================================================

    /// Host "set value": apply optimistically, then push to the receiver.
    ///
    /// The optimistic value stays in place even if the push fails; the next
    /// poll reconciles it with the device.
    pub async fn set_property(
        &self,
        name: PropertyName,
        value: PropertyValue,
    ) -> Result<CommandOutcome, SessionError> {
        let property = self
            .description
            .property(name)
            .ok_or(SessionError::UnknownProperty(name))?;
        if property.read_only {
            return Err(SessionError::ReadOnly(name));
        }
        if !property.kind.accepts(&value) {
            return Err(SessionError::InvalidValue {
                property: name,
                expected: property.kind.type_name(),
                value,
            });
        }

        info!("Set value of {} / {} to {}", self.identity, name, value);

        {
            let mut table = self.properties.write().await;
            if table.apply_local(name, value.clone()) {
                self.host.property_changed(self.id(), name, &value);
            }
        }

        let outcome = match (name, &value) {
            (PropertyName::Power, PropertyValue::Boolean(on)) => self.set_power(*on).await,
            (PropertyName::Volume, PropertyValue::Integer(volume)) => {
                self.set_volume(*volume).await
            }
            (PropertyName::Input, PropertyValue::Text(input)) => self.set_input(input).await,
            _ => return Err(SessionError::ReadOnly(name)),
        };
        Ok(outcome)
    }

    pub async fn set_power(&self, on: bool) -> CommandOutcome {
        let power = Power::from(on);
        self.dispatch("setPower", self.client.set_power(power, MAIN_ZONE))
            .await
    }

    pub async fn set_volume(&self, volume: i64) -> CommandOutcome {
        self.dispatch("setVolume", self.client.set_volume(volume, MAIN_ZONE))
            .await
    }

    pub async fn set_input(&self, input: &str) -> CommandOutcome {
        self.dispatch("setInput", self.client.set_input(input, MAIN_ZONE))
            .await
    }

    pub async fn set_playback(&self, playback: Playback) -> CommandOutcome {
        self.dispatch("setPlayback", self.client.set_playback(playback))
            .await
    }

    async fn dispatch(
        &self,
        command: &str,
        call: impl Future<Output = super::client::Result<CommandResponse>>,
    ) -> CommandOutcome {
        match call.await {
            Ok(response) => {
                debug!("{} {}: {:?}", self.identity, command, response);
                CommandOutcome::Accepted
            }
            Err(e) => {
                warn!("Could not {} on {}: {}", command, self.identity, e);
                CommandOutcome::Failed(e.to_string())
            }
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Run a named action: mark started, dispatch best-effort, mark finished.
    pub async fn perform_action(&self, name: &str) -> ActionRecord {
        let mut action = ActionRecord::new(name);
        action.start();
        self.host.action_status(self.id(), &action);

        match Playback::from_name(name) {
            Some(playback) => {
                self.set_playback(playback).await;
            }
            None => warn!("Unknown action {} on {}", name, self.identity),
        }

        action.finish();
        self.host.action_status(self.id(), &action);
        action
    }
}

fn playback_actions() -> Vec<ActionDescription> {
    [
        (Playback::Play, "Continue the playback"),
        (Playback::Pause, "Pause the playback"),
        (Playback::Previous, "Jump to the previous track"),
        (Playback::Next, "Jump to the next track"),
    ]
    .into_iter()
    .map(|(playback, description)| ActionDescription {
        name: playback.as_str().to_string(),
        title: playback.as_str().to_string(),
        description: description.to_string(),
    })
    .collect()
}
