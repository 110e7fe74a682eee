//! Yamaha Extended Control adapter
//!
//! Data flow: SSDP discovery → registry (identity fetch, dedup) → session →
//! per-session poller → property diff → host notification.

pub mod client;
pub mod discovery;
pub mod poller;
pub mod properties;
pub mod registry;
pub mod session;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::DeviceHost;
use crate::bus::{BusEvent, SharedBus};
use crate::config::Config;

use discovery::{Discovery, DiscoveryOptions, OnFound};
use registry::{DeviceRegistry, Registration};

pub use client::YamahaClient;
pub use session::{CommandOutcome, DeviceSession, DeviceView, SessionError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A configured timeout in milliseconds, with 0 meaning `default`.
fn millis_or(millis: u64, default: Duration) -> Duration {
    match millis {
        0 => default,
        ms => Duration::from_millis(ms),
    }
}

#[derive(Debug, Clone)]
pub struct YamahaSettings {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub discovery: DiscoveryOptions,
}

impl Default for YamahaSettings {
    fn default() -> Self {
        Self {
            poll_interval: poller::DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            discovery: DiscoveryOptions::default(),
        }
    }
}

impl From<&Config> for YamahaSettings {
    fn from(config: &Config) -> Self {
        let defaults = DiscoveryOptions::default();
        Self {
            poll_interval: config.poll_interval(),
            request_timeout: millis_or(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT),
            discovery: DiscoveryOptions {
                search_interval: Duration::from_secs(config.discovery.search_interval_secs.max(1)),
                search_window: Duration::from_secs(config.discovery.search_window_secs.max(1)),
                description_timeout: millis_or(
                    config.discovery.description_timeout_ms,
                    defaults.description_timeout,
                ),
            },
        }
    }
}

/// Owns discovery and the registry; sessions live until the adapter stops.
///
/// One-shot: polling timers hang off the adapter's shutdown token, so a
/// stopped adapter cannot be started again.
pub struct YamahaAdapter {
    registry: Arc<DeviceRegistry>,
    discovery: Arc<Discovery>,
    bus: SharedBus,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl YamahaAdapter {
    pub fn new(bus: SharedBus, settings: YamahaSettings) -> Self {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .unwrap_or_default();

        let shutdown = CancellationToken::new();
        let host: Arc<dyn DeviceHost> = bus.clone();
        let registry = Arc::new(DeviceRegistry::new(
            http.clone(),
            host,
            settings.poll_interval,
            shutdown.clone(),
        ));

        Self {
            registry,
            discovery: Arc::new(Discovery::new(http, settings.discovery)),
            bus,
            shutdown,
            running: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start SSDP discovery (internal - use Startable trait)
    async fn start_internal(&self) -> anyhow::Result<()> {
        if self.shutdown.is_cancelled() {
            bail!("Yamaha adapter was stopped and cannot be restarted");
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let shutdown = self.shutdown.clone();

        let registry = self.registry.clone();
        let registry_shutdown = shutdown.clone();
        let on_found: OnFound = Arc::new(move |address: String| {
            let registry = registry.clone();
            let shutdown = registry_shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    result = registry.on_address(&address) => match result {
                        Ok(Registration::Added(session)) => {
                            debug!("Session {} started", session.id());
                        }
                        Ok(Registration::Known(_)) => {}
                        Err(e) => warn!("Could not register receiver at {}: {}", address, e),
                    }
                }
            });
        });

        let discovery = self.discovery.clone();
        tokio::spawn(discovery.run(on_found, shutdown));

        info!("Yamaha adapter started");
        Ok(())
    }

    /// Stop discovery and every polling timer (internal - use Startable trait)
    async fn stop_internal(&self) {
        self.shutdown.cancel();
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        self.bus.publish(BusEvent::AdapterStopped {
            adapter: "yamaha".to_string(),
        });
        info!("Yamaha adapter stopped");
    }
}

crate::impl_startable!(YamahaAdapter, "yamaha");
