//! Submitting a roll call: queue first, then try to deliver.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::models::{AbsenteeRecord, Session};
use crate::queue::{LocalId, NewAttendanceRecord, QueueError};
use crate::sync::{ConnectivityMonitor, NetworkStatus, SyncEngine};

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Please mark attendance for at least one student.")]
    NothingToSubmit,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// One row of the roll-call screen. `None` means not marked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollCallEntry {
    pub student_id: String,
    pub is_present: Option<bool>,
}

impl RollCallEntry {
    pub fn new(student_id: impl Into<String>, is_present: Option<bool>) -> Self {
        Self {
            student_id: student_id.into(),
            is_present,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RollCallOutcome {
    /// Every record of the roll call reached the server
    Submitted { count: usize },
    /// At least `pending` of the `count` records are still queued
    SavedOffline { count: usize, pending: usize },
}

impl RollCallOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RollCallOutcome::Submitted { .. } => "Attendance submitted successfully!",
            RollCallOutcome::SavedOffline { .. } => {
                "Attendance saved offline. Will sync when connection is restored."
            }
        }
    }
}

pub struct AttendanceRecorder {
    engine: SyncEngine,
    monitor: Arc<ConnectivityMonitor>,
}

impl AttendanceRecorder {
    pub fn new(engine: SyncEngine, monitor: Arc<ConnectivityMonitor>) -> Self {
        Self { engine, monitor }
    }

    /// Queue every marked entry under one shared timestamp, then flush
    /// unless the monitor says we are offline.
    ///
    /// All records are durable before the first network call. An error
    /// part-way through enqueueing leaves the records queued so far in place.
    pub async fn record_roll_call(
        &self,
        session_id: &str,
        entries: &[RollCallEntry],
    ) -> Result<RollCallOutcome, RecordError> {
        let timestamp = Utc::now();
        let records: Vec<NewAttendanceRecord> = entries
            .iter()
            .filter_map(|entry| {
                entry.is_present.map(|is_present| NewAttendanceRecord {
                    session_id: session_id.to_string(),
                    student_id: entry.student_id.clone(),
                    is_present,
                    timestamp,
                })
            })
            .collect();
        if records.is_empty() {
            return Err(RecordError::NothingToSubmit);
        }

        let queue = self.engine.queue();
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(queue.enqueue(record)?);
        }
        let count = ids.len();
        info!(session_id = session_id, count = count, "Roll call queued");

        let status = self.monitor.status();
        if status == NetworkStatus::Offline {
            debug!("Offline, leaving roll call queued");
            return Ok(RollCallOutcome::SavedOffline { count, pending: count });
        }

        self.engine.flush().await;
        // A pass that was already running took its snapshot before these
        // records existed; run one more so they get their attempt now.
        if self.untried(&ids) > 0 {
            debug!("Roll call missed the running sync pass, flushing again");
            self.engine.flush().await;
        }

        let pending = self.still_queued(&ids);
        if pending == 0 {
            Ok(RollCallOutcome::Submitted { count })
        } else {
            Ok(RollCallOutcome::SavedOffline { count, pending })
        }
    }

    fn untried(&self, ids: &[LocalId]) -> usize {
        ids.iter()
            .filter(|id| {
                matches!(self.engine.queue().get(id), Ok(Some(record)) if record.attempts == 0)
            })
            .count()
    }

    /// Unreadable lookups count as still queued
    fn still_queued(&self, ids: &[LocalId]) -> usize {
        ids.iter()
            .filter(|id| !matches!(self.engine.queue().get(id), Ok(None)))
            .count()
    }

    /// Students marked absent, as report rows for contacting their parents.
    /// Entries for students not on the session roster are skipped.
    pub fn absentees(session: &Session, entries: &[RollCallEntry]) -> Vec<AbsenteeRecord> {
        let date = Utc::now();
        entries
            .iter()
            .filter(|entry| entry.is_present == Some(false))
            .filter_map(|entry| match session.student(&entry.student_id) {
                Some(student) => Some(AbsenteeRecord::from_roll_call(session, student, date)),
                None => {
                    debug!(student_id = %entry.student_id, "Absent student not on session roster");
                    None
                }
            })
            .collect()
    }
}
