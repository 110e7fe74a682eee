//! SSDP discovery of receivers that speak Yamaha Extended Control.
//!
//! MediaRenderer search responses are filtered by fetching their description
//! document and looking for the Extended Control service type. Matches are
//! reported once per response; deduplication is the registry's job.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use ssdp_client::{SearchTarget, URN};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const MEDIA_RENDERER_URN: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";
pub const EXTENDED_CONTROL_SERVICE: &str =
    "urn:schemas-yamaha-com:service:X_YamahaExtendedControl:1";

/// SSDP MX value: responders spread their replies over this many seconds
const SEARCH_MX: usize = 2;

/// Callback invoked with the address of every matching response
pub type OnFound = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Delay between successive searches
    pub search_interval: Duration,
    /// How long each search collects responses
    pub search_window: Duration,
    /// Best-effort limit for fetching a description document
    pub description_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            search_interval: Duration::from_secs(30),
            search_window: Duration::from_secs(3),
            description_timeout: Duration::from_secs(5),
        }
    }
}

/// Fetch a description document and report whether it advertises Extended Control.
///
/// Any failure (unreachable, timeout, non-200) is "no match", never an error.
pub async fn implements_extended_control(http: &Client, location: &str, timeout: Duration) -> bool {
    let response = match http.get(location).timeout(timeout).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!("Fetch to {} failed, ignoring: {}", location, e);
            return false;
        }
    };

    if response.status() != StatusCode::OK {
        debug!(
            "Fetch to {} returned {}, ignoring",
            location,
            response.status()
        );
        return false;
    }

    match response.text().await {
        Ok(xml) => xml.contains(EXTENDED_CONTROL_SERVICE),
        Err(e) => {
            debug!("Reading description at {} failed: {}", location, e);
            false
        }
    }
}

/// Host part of a LOCATION URL, used as the receiver's control address.
pub fn responder_address(location: &str) -> Option<String> {
    let url = url::Url::parse(location).ok()?;
    url.host_str().map(str::to_string)
}

pub struct Discovery {
    http: Client,
    options: DiscoveryOptions,
}

impl Discovery {
    pub fn new(http: Client, options: DiscoveryOptions) -> Self {
        Self { http, options }
    }

    /// Decide whether one search response is an Extended Control receiver.
    ///
    /// Returns the address to report, or `None` to ignore the response.
    pub async fn evaluate(&self, location: &str) -> Option<String> {
        if location.trim().is_empty() {
            debug!("No location present, ignoring response");
            return None;
        }

        let Some(address) = responder_address(location) else {
            debug!("Unusable location {}, ignoring", location);
            return None;
        };

        implements_extended_control(&self.http, location, self.options.description_timeout)
            .await
            .then_some(address)
    }

    /// Search repeatedly until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, on_found: OnFound, shutdown: CancellationToken) {
        let mut ticker = interval(self.options.search_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Searching for {}", MEDIA_RENDERER_URN);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        result = self.search_once(&on_found) => {
                            if let Err(e) = result {
                                warn!("SSDP search failed: {}", e);
                            }
                        }
                    }
                }
            }
        }

        info!("Discovery stopped");
    }

    async fn search_once(self: &Arc<Self>, on_found: &OnFound) -> anyhow::Result<()> {
        let urn: URN = MEDIA_RENDERER_URN.parse()?;
        let search_target = SearchTarget::URN(urn);
        let responses =
            ssdp_client::search(&search_target, self.options.search_window, SEARCH_MX, None)
                .await?;

        futures::pin_mut!(responses);

        while let Some(response) = responses.next().await {
            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    // Typically a response without a LOCATION header
                    debug!("Ignoring SSDP response: {}", e);
                    continue;
                }
            };

            let location = response.location().to_string();
            let discovery = Arc::clone(self);
            let on_found = Arc::clone(on_found);

            // Description fetches are independent; one slow device must not hold up the rest
            tokio::spawn(async move {
                if let Some(address) = discovery.evaluate(&location).await {
                    debug!("{} implements Extended Control", address);
                    on_found(address);
                }
            });
        }

        Ok(())
    }
}
