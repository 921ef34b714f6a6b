use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
#[cfg(feature = "ts")]
use ts_rs::TS;

use super::SyncEngine;

/// Quiet period a change must survive before the auto-sync reacts to it
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Online,
    Offline,
    /// Nothing reported yet
    Unknown,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        self == NetworkStatus::Online
    }
}

/// Tracks reachability reported by the platform and tells subscribers when
/// it changes.
///
/// The monitor does not probe anything itself; whoever owns the network
/// signal calls `set_status`. Repeated reports of the same status are not
/// forwarded.
pub struct ConnectivityMonitor {
    tx: watch::Sender<NetworkStatus>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Unknown)
    }
}

impl ConnectivityMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Record the current status. Returns whether it changed.
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            info!(status = ?status, "Network status changed");
        }
        changed
    }

    pub fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }

    /// Flush `engine` whenever the status settles on online after having
    /// been something else.
    ///
    /// Every change restarts a `debounce` window; only the status at the end
    /// of a quiet window counts. So offline, online, offline inside one
    /// window triggers nothing, and rapid flapping that ends online triggers
    /// a single flush. The task ends when the monitor is dropped.
    pub fn spawn_auto_sync(&self, engine: SyncEngine, debounce: Duration) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        let mut settled = *rx.borrow_and_update();

        tokio::spawn(async move {
            loop {
                if rx.changed().await.is_err() {
                    break;
                }

                // Wait until no change arrives for a full window
                let mut closed = false;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(debounce) => break,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                closed = true;
                                break;
                            }
                        }
                    }
                }
                if closed {
                    break;
                }

                let current = *rx.borrow_and_update();
                let previous = std::mem::replace(&mut settled, current);
                if current.is_online() && !previous.is_online() {
                    debug!(from = ?previous, "Connection restored, flushing attendance queue");
                    let summary = engine.flush().await;
                    info!(
                        submitted = summary.submitted,
                        remaining = summary.remaining,
                        "Auto-sync finished"
                    );
                }
            }
            debug!("Connectivity monitor dropped, auto-sync stopped");
        })
    }
}
