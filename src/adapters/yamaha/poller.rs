//! Fixed-interval polling of a session's status and play info.
//!
//! The timer is independent of poll success. At most one poll cycle is in
//! flight per session; a tick that arrives while the previous cycle is still
//! running is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::MAIN_ZONE;
use super::session::DeviceSession;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Map a configured interval in milliseconds to a timer period (0 means default).
pub fn poll_interval_from_millis(millis: u64) -> Duration {
    match millis {
        0 => DEFAULT_POLL_INTERVAL,
        ms => Duration::from_millis(ms),
    }
}

/// What one poll cycle applied. `None` means that fetch failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub status_changes: Option<usize>,
    pub play_info_changes: Option<usize>,
}

/// Fetch both snapshots concurrently and apply whichever succeeded.
pub async fn poll_once(session: &DeviceSession) -> PollReport {
    let client = session.client();
    let (status, play_info) = tokio::join!(client.get_status(MAIN_ZONE), client.get_play_info());

    let status_changes = match status {
        Ok(status) => Some(session.update_status(&status).await),
        Err(e) => {
            debug!("{}: status poll failed: {}", session.identity(), e);
            None
        }
    };

    let play_info_changes = match play_info {
        Ok(info) => Some(session.update_play_info(&info).await),
        Err(e) => {
            debug!("{}: play info poll failed: {}", session.identity(), e);
            None
        }
    };

    PollReport {
        status_changes,
        play_info_changes,
    }
}

/// Clears the in-flight flag when the poll cycle ends, however it ends.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Arm the repeating poll timer for `session`. The first tick fires immediately.
pub fn start_polling(
    session: Arc<DeviceSession>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let in_flight = Arc::new(AtomicBool::new(false));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(
            "{}: polling every {:?}",
            session.identity(),
            period
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("{}: polling stopped", session.identity());
                    break;
                }
                _ = ticker.tick() => {
                    let Some(guard) = InFlight::try_acquire(&in_flight) else {
                        debug!("{}: previous poll still running, skipping tick", session.identity());
                        continue;
                    };

                    let session = session.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        tokio::select! {
                            _ = shutdown.cancelled() => {}
                            _ = poll_once(&session) => {}
                        }
                    });
                }
            }
        }
    })
}
