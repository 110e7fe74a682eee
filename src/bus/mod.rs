//! Event bus for inter-component communication
//!
//! Uses tokio::sync::broadcast for pub/sub pattern.
//! The bus is the default [`DeviceHost`]: every host notification from the
//! Yamaha adapter becomes a [`BusEvent`] that the HTTP API and SSE clients consume.

pub mod events;

pub use events::*;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::adapters::DeviceHost;

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BusEvent) {
        tracing::trace!("bus: {}", event.event_type());
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

impl DeviceHost for EventBus {
    fn device_added(&self, device: &DeviceDescription) {
        self.publish(BusEvent::DeviceAdded {
            device: device.clone(),
        });
    }

    fn property_changed(&self, device_id: &str, property: PropertyName, value: &PropertyValue) {
        self.publish(BusEvent::PropertyChanged {
            device_id: device_id.to_string(),
            property,
            value: value.clone(),
        });
    }

    fn action_status(&self, device_id: &str, action: &ActionRecord) {
        self.publish(BusEvent::ActionStatus {
            device_id: device_id.to_string(),
            action: action.clone(),
        });
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}
