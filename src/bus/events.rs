//! Event and model types shared between the Yamaha adapter and the host side.
//!
//! The host (HTTP API, SSE subscribers, tests) only ever sees these types:
//! device descriptions with their property schema, property values, and
//! action records. The adapter converts vendor responses into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Properties
// =============================================================================

/// Properties tracked for every receiver (primary zone only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyName {
    Power,
    Volume,
    Input,
    Track,
    Album,
    Artist,
}

impl PropertyName {
    pub const ALL: [PropertyName; 6] = [
        Self::Power,
        Self::Volume,
        Self::Input,
        Self::Track,
        Self::Album,
        Self::Artist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Volume => "volume",
            Self::Input => "input",
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown property: {}", s))
    }
}

/// A property value as exchanged with the host (plain JSON scalar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// JSON-schema flavoured type of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropertyKind {
    Boolean,
    Integer {
        minimum: i64,
        maximum: i64,
        #[serde(rename = "multipleOf")]
        multiple_of: i64,
    },
    String {
        #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
        allowed: Vec<String>,
    },
}

impl PropertyKind {
    /// Basic type-shape check. Ranges and enums are left to the device.
    pub fn accepts(&self, value: &PropertyValue) -> bool {
        matches!(
            (self, value),
            (Self::Boolean, PropertyValue::Boolean(_))
                | (Self::Integer { .. }, PropertyValue::Integer(_))
                | (Self::String { .. }, PropertyValue::Text(_))
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer { .. } => "integer",
            Self::String { .. } => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescription {
    pub name: PropertyName,
    pub title: String,
    pub description: String,
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
    #[serde(flatten)]
    pub kind: PropertyKind,
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
}

/// Cached value of one property plus whether a poll has confirmed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    pub name: PropertyName,
    /// `None` until the first successful poll
    pub value: Option<PropertyValue>,
    pub confirmed: bool,
}

// =============================================================================
// Devices and actions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescription {
    pub name: String,
    pub title: String,
    pub description: String,
}

/// Everything the host needs to render a newly discovered receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescription {
    /// Host-facing id, `yamaha-<device_id>`
    pub id: String,
    pub name: String,
    pub model: String,
    pub address: String,
    #[serde(rename = "@type")]
    pub capabilities: Vec<String>,
    pub properties: Vec<PropertyDescription>,
    pub actions: Vec<ActionDescription>,
}

impl DeviceDescription {
    pub fn property(&self, name: PropertyName) -> Option<&PropertyDescription> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Created,
    Pending,
    Completed,
}

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// One requested action and its lifecycle timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub name: String,
    pub status: ActionStatus,
    pub time_requested: DateTime<Utc>,
    pub time_completed: Option<DateTime<Utc>>,
}

impl ActionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        let seq = NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("action-{}", seq),
            name: name.into(),
            status: ActionStatus::Created,
            time_requested: Utc::now(),
            time_completed: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ActionStatus::Pending;
    }

    pub fn finish(&mut self) {
        self.status = ActionStatus::Completed;
        self.time_completed = Some(Utc::now());
    }
}

// =============================================================================
// Bus events
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    /// A receiver was discovered and its session started
    DeviceAdded { device: DeviceDescription },

    /// A cached property took a new value
    PropertyChanged {
        device_id: String,
        property: PropertyName,
        value: PropertyValue,
    },

    /// An action moved through its lifecycle
    ActionStatus {
        device_id: String,
        action: ActionRecord,
    },

    /// Adapter finished shutting down
    AdapterStopped { adapter: String },
}

impl BusEvent {
    /// Get the event type as a string (for logging/filtering)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DeviceAdded { .. } => "device_added",
            Self::PropertyChanged { .. } => "property_changed",
            Self::ActionStatus { .. } => "action_status",
            Self::AdapterStopped { .. } => "adapter_stopped",
        }
    }

    /// Device this event concerns, if any
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::DeviceAdded { device } => Some(&device.id),
            Self::PropertyChanged { device_id, .. } | Self::ActionStatus { device_id, .. } => {
                Some(device_id)
            }
            Self::AdapterStopped { .. } => None,
        }
    }
}
