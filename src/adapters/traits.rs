use anyhow::Result;
use async_trait::async_trait;

use crate::bus::{ActionRecord, DeviceDescription, PropertyName, PropertyValue};

// =============================================================================
// Startable - Uniform adapter lifecycle trait
// =============================================================================

/// Trait for adapters that can be started/stopped uniformly.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Adapter name (e.g., "yamaha")
    fn name(&self) -> &'static str;

    /// Start the adapter. No-op if already running.
    async fn start(&self) -> Result<()>;

    /// Stop the adapter. In-flight requests are not drained.
    async fn stop(&self);
}

/// Macro to implement Startable trait with minimal boilerplate.
///
/// Adapters must implement:
/// - `async fn start_internal(&self) -> Result<()>`
/// - `async fn stop_internal(&self)`
///
/// Usage:
/// ```ignore
/// impl_startable!(YamahaAdapter, "yamaha");
/// ```
#[macro_export]
macro_rules! impl_startable {
    ($adapter:ty, $name:literal) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $adapter {
            fn name(&self) -> &'static str {
                $name
            }

            async fn start(&self) -> anyhow::Result<()> {
                self.start_internal().await
            }

            async fn stop(&self) {
                self.stop_internal().await
            }
        }
    };
}

// =============================================================================
// DeviceHost - the property framework the adapter reports into
// =============================================================================

/// Receiver of device lifecycle and property notifications.
///
/// Implementations must not block: they are called from polling tasks, with the
/// session's property table locked. They must not call back into the session.
pub trait DeviceHost: Send + Sync + 'static {
    /// A new receiver session exists and is about to start polling
    fn device_added(&self, device: &DeviceDescription);

    /// A cached property changed value
    fn property_changed(&self, device_id: &str, property: PropertyName, value: &PropertyValue);

    /// An action was started or finished
    fn action_status(&self, device_id: &str, action: &ActionRecord);
}
