//! Identity-keyed table of live sessions.
//!
//! Every discovered address costs one identity fetch; the session is only
//! created if no other discovery has claimed that identity first. The claim
//! is taken under the write lock, so two racing discoveries of the same
//! receiver produce exactly one session.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::Client;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::YamahaClient;
use super::poller::start_polling;
use super::session::DeviceSession;
use crate::adapters::DeviceHost;

enum Slot {
    /// Identity claimed, features still being fetched
    Pending,
    Active(Arc<DeviceSession>),
}

/// What `on_address` did with a discovered address
#[derive(Clone)]
pub enum Registration {
    Added(Arc<DeviceSession>),
    /// The identity already has (or is getting) a session
    Known(String),
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added(session) => f.debug_tuple("Added").field(&session.id()).finish(),
            Self::Known(identity) => f.debug_tuple("Known").field(identity).finish(),
        }
    }
}

pub struct DeviceRegistry {
    slots: RwLock<HashMap<String, Slot>>,
    http: Client,
    host: Arc<dyn DeviceHost>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl DeviceRegistry {
    pub fn new(
        http: Client,
        host: Arc<dyn DeviceHost>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            http,
            host,
            poll_interval,
            shutdown,
        }
    }

    /// Handle one discovered address: identify it, then create a session if it is new.
    pub async fn on_address(&self, address: &str) -> Result<Registration> {
        let client = YamahaClient::new(self.http.clone(), address);
        let info = client.get_device_info().await?;

        if info.device_id.is_empty() {
            bail!("{} reported an empty device_id", address);
        }

        if !self.claim(&info.device_id).await {
            debug!("{} at {} is already known", info.device_id, address);
            return Ok(Registration::Known(info.device_id));
        }

        info!("Found yamaha {} ({}) at {}", info.model_name, info.device_id, address);

        let features = match client.get_features().await {
            Ok(features) => features,
            Err(e) => {
                // Let a later discovery response try again
                self.release(&info.device_id).await;
                return Err(e.into());
            }
        };

        let session = Arc::new(DeviceSession::new(
            client,
            &info,
            &features,
            self.host.clone(),
        ));

        {
            let mut slots = self.slots.write().await;
            slots.insert(info.device_id.clone(), Slot::Active(session.clone()));
        }

        self.host.device_added(session.description());
        start_polling(session.clone(), self.poll_interval, self.shutdown.child_token());

        Ok(Registration::Added(session))
    }

    async fn claim(&self, identity: &str) -> bool {
        let mut slots = self.slots.write().await;
        match slots.entry(identity.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Slot::Pending);
                true
            }
        }
    }

    async fn release(&self, identity: &str) {
        let mut slots = self.slots.write().await;
        if matches!(slots.get(identity), Some(Slot::Pending)) {
            slots.remove(identity);
        }
    }

    /// Session by vendor device_id
    pub async fn get(&self, identity: &str) -> Option<Arc<DeviceSession>> {
        let slots = self.slots.read().await;
        match slots.get(identity) {
            Some(Slot::Active(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Session by host-facing id (`yamaha-<device_id>`)
    pub async fn find(&self, device_id: &str) -> Option<Arc<DeviceSession>> {
        self.sessions()
            .await
            .into_iter()
            .find(|session| session.id() == device_id)
    }

    /// All active sessions, ordered by id
    pub async fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        let mut sessions: Vec<_> = {
            let slots = self.slots.read().await;
            slots
                .values()
                .filter_map(|slot| match slot {
                    Slot::Active(session) => Some(session.clone()),
                    Slot::Pending => None,
                })
                .collect()
        };
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions
    }

    pub async fn len(&self) -> usize {
        self.sessions().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
