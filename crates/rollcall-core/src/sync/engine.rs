//! Reconciliation of the attendance queue with the server.
//!
//! A flush takes one snapshot of the queue and submits the due records one
//! at a time. Each record's outcome is written back before the next one is
//! sent, so a pass interrupted at any point leaves every record either
//! removed (confirmed) or still queued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
#[cfg(feature = "ts")]
use ts_rs::TS;

use super::RetryPolicy;
use crate::api::{ApiError, AttendanceSubmission, RemoteClient};
use crate::queue::{PendingQueue, QueuedAttendanceRecord};

/// Default bound on a single submission, matching the web client's fetch timeout
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub submit_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Records the server accepted during this pass
    pub submitted: usize,
    /// Submissions that failed during this pass
    pub failed: usize,
    /// Unsynced records left in the queue when the pass ended
    pub remaining: usize,
    /// Of `remaining`, records parked after hitting the retry limit
    pub needs_attention: usize,
}

impl SyncSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.remaining == 0
    }

    pub fn message(&self) -> String {
        let mut message = if self.remaining == 0 {
            if self.submitted == 0 {
                "Nothing to sync.".to_string()
            } else {
                "Attendance submitted successfully!".to_string()
            }
        } else {
            "Attendance saved offline. Will sync when connection is restored.".to_string()
        };
        if self.needs_attention > 0 {
            message.push_str(&format!(
                " {} record(s) need attention.",
                self.needs_attention
            ));
        }
        message
    }
}

type PassFuture = Shared<BoxFuture<'static, SyncSummary>>;

/// Drains the pending queue against the remote service.
///
/// Cheap to clone; clones share the queue and the in-flight pass. Flushing
/// spawns onto the current tokio runtime.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    queue: Arc<PendingQueue>,
    remote: Arc<dyn RemoteClient>,
    options: SyncOptions,
    /// `(pass number, pass)` while syncing
    in_flight: Mutex<Option<(u64, PassFuture)>>,
    passes: Mutex<u64>,
}

impl SyncEngine {
    pub fn new(queue: Arc<PendingQueue>, remote: Arc<dyn RemoteClient>, options: SyncOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                queue,
                remote,
                options,
                in_flight: Mutex::new(None),
                passes: Mutex::new(0),
            }),
        }
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.inner.queue
    }

    pub fn state(&self) -> SyncState {
        if self.inner.lock_in_flight().is_some() {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    /// Run one reconciliation pass and return its summary.
    ///
    /// If a pass is already running, no second pass is started: the caller
    /// waits for the running one and gets its summary. The pass runs as its
    /// own task, so dropping the returned future does not stop it.
    pub async fn flush(&self) -> SyncSummary {
        let pass = {
            let mut in_flight = self.inner.lock_in_flight();
            match in_flight.as_ref() {
                Some((id, pass)) => {
                    debug!(pass = id, "Sync pass already running, joining it");
                    pass.clone()
                }
                None => {
                    let id = self.inner.next_pass_id();
                    let inner = Arc::clone(&self.inner);
                    let handle = tokio::spawn(async move {
                        let summary = inner.run_pass(id).await;
                        inner.finish_pass(id);
                        summary
                    });

                    let inner = Arc::clone(&self.inner);
                    let pass = async move {
                        match handle.await {
                            Ok(summary) => summary,
                            Err(e) => {
                                error!(pass = id, error = %e, "Sync pass task failed");
                                inner.finish_pass(id);
                                SyncSummary::default()
                            }
                        }
                    }
                    .boxed()
                    .shared();

                    *in_flight = Some((id, pass.clone()));
                    pass
                }
            }
        };
        pass.await
    }
}

impl EngineInner {
    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<(u64, PassFuture)>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_pass_id(&self) -> u64 {
        let mut passes = self.passes.lock().unwrap_or_else(|e| e.into_inner());
        *passes += 1;
        *passes
    }

    fn finish_pass(&self, id: u64) {
        let mut in_flight = self.lock_in_flight();
        if matches!(in_flight.as_ref(), Some((current, _)) if *current == id) {
            *in_flight = None;
        }
    }

    async fn run_pass(&self, id: u64) -> SyncSummary {
        let snapshot = match self.queue.list_unsynced() {
            Ok(records) => records,
            Err(e) => {
                error!(pass = id, error = %e, "Cannot read attendance queue, skipping sync pass");
                return SyncSummary::default();
            }
        };

        let now = Utc::now();
        let total = snapshot.len();
        let due: Vec<QueuedAttendanceRecord> =
            snapshot.into_iter().filter(|r| r.is_due(now)).collect();
        info!(pass = id, due = due.len(), queued = total, "Sync pass started");

        let mut summary = SyncSummary::default();
        for record in &due {
            match self.deliver(record).await {
                Ok(()) => {
                    summary.submitted += 1;
                    if let Err(e) = self.queue.mark_synced(&record.local_id) {
                        // Still queued: the next pass resends it and the server ignores the duplicate
                        warn!(local_id = %record.local_id, error = %e, "Delivered but failed to dequeue record");
                        if let Err(e) = self.queue.record_attempt(&record.local_id) {
                            warn!(local_id = %record.local_id, error = %e, "Failed to count delivery attempt");
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    self.handle_failure(record, &e);
                }
            }
        }

        match self.queue.list_unsynced() {
            Ok(rest) => {
                summary.remaining = rest.len();
                summary.needs_attention = rest.iter().filter(|r| r.needs_attention).count();
            }
            Err(e) => {
                error!(pass = id, error = %e, "Cannot read attendance queue after sync pass");
                summary.remaining = total.saturating_sub(summary.submitted);
            }
        }

        info!(
            pass = id,
            submitted = summary.submitted,
            failed = summary.failed,
            remaining = summary.remaining,
            needs_attention = summary.needs_attention,
            "Sync pass finished"
        );
        summary
    }

    async fn deliver(&self, record: &QueuedAttendanceRecord) -> Result<(), ApiError> {
        let submission = AttendanceSubmission::from(record);
        let timeout = self.options.submit_timeout;
        match tokio::time::timeout(timeout, self.remote.send(&submission)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }

    fn handle_failure(&self, record: &QueuedAttendanceRecord, error: &ApiError) {
        warn!(
            local_id = %record.local_id,
            session_id = %record.session_id,
            student_id = %record.student_id,
            transient = error.is_transient(),
            error = %error,
            "Attendance submission failed"
        );

        let updated = match self.queue.record_failure(&record.local_id, &error.to_string()) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(local_id = %record.local_id, error = %e, "Failed to record submission failure");
                return;
            }
        };

        let policy = &self.options.retry;
        let result = if policy.is_exhausted(updated.attempts) {
            warn!(
                local_id = %record.local_id,
                attempts = updated.attempts,
                "Retry limit reached, record needs attention"
            );
            self.queue.mark_needs_attention(&record.local_id)
        } else if let Some(delay) = policy.backoff(updated.attempts) {
            let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            debug!(local_id = %record.local_id, delay_secs = delay.num_seconds(), "Backing off record");
            self.queue.defer_until(&record.local_id, Utc::now() + delay)
        } else {
            Ok(())
        };

        if let Err(e) = result {
            warn!(local_id = %record.local_id, error = %e, "Failed to apply retry policy");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
