use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::{LocalId, NewAttendanceRecord, QueueError, QueuedAttendanceRecord};
use crate::storage::Storage;

/// Logical key of the queue document; the namespace prefix is added on top
pub const ATTENDANCE_QUEUE_KEY: &str = "attendance_queue";

/// Durable, ordered queue of attendance records awaiting confirmed delivery.
///
/// The whole queue is one JSON array, rewritten on every mutation. Every
/// mutation is persisted before the call returns. A record leaves the queue
/// only through `mark_synced`.
pub struct PendingQueue {
    storage: Arc<dyn Storage>,
    key: String,
    lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(storage: Arc<dyn Storage>, namespace: &str) -> Self {
        Self {
            storage,
            key: format!("{}_{}", namespace, ATTENDANCE_QUEUE_KEY),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<QueuedAttendanceRecord>, QueueError> {
        let Some(contents) = self.storage.get(&self.key)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&contents).map_err(|e| {
            error!(key = %self.key, error = %e, "Attendance queue is unreadable; leaving it untouched");
            QueueError::Corrupt(e)
        })
    }

    fn save(&self, records: &[QueuedAttendanceRecord]) -> Result<(), QueueError> {
        let contents = serde_json::to_string(records).map_err(crate::storage::StorageError::from)?;
        self.storage.set(&self.key, &contents)?;
        Ok(())
    }

    /// Load, apply `f`, persist. Nothing is written when `f` fails or the
    /// document cannot be decoded.
    fn update<R>(
        &self,
        f: impl FnOnce(&mut Vec<QueuedAttendanceRecord>) -> Result<R, QueueError>,
    ) -> Result<R, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.load()?;
        let result = f(&mut records)?;
        self.save(&records)?;
        Ok(result)
    }

    fn find<'a>(
        records: &'a mut [QueuedAttendanceRecord],
        local_id: &LocalId,
    ) -> Result<&'a mut QueuedAttendanceRecord, QueueError> {
        records
            .iter_mut()
            .find(|r| &r.local_id == local_id)
            .ok_or_else(|| QueueError::NotFound(local_id.clone()))
    }

    /// Persist a new record and return its id. Once this returns `Ok`, the
    /// record survives restarts.
    pub fn enqueue(&self, record: NewAttendanceRecord) -> Result<LocalId, QueueError> {
        let local_id = LocalId::generate();
        let queued = QueuedAttendanceRecord::from_new(local_id.clone(), record);
        let depth = self.update(|records| {
            records.push(queued);
            Ok(records.len())
        })?;
        info!(local_id = %local_id, depth = depth, "Queued attendance record");
        Ok(local_id)
    }

    /// Unsynced records in insertion order
    pub fn list_unsynced(&self) -> Result<Vec<QueuedAttendanceRecord>, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.into_iter().filter(|r| !r.synced).collect())
    }

    pub fn get(&self, local_id: &LocalId) -> Result<Option<QueuedAttendanceRecord>, QueueError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.into_iter().find(|r| &r.local_id == local_id))
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.list_unsynced()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Confirm delivery: the record is flagged synced and removed in one write.
    pub fn mark_synced(&self, local_id: &LocalId) -> Result<(), QueueError> {
        self.update(|records| {
            let record = Self::find(records, local_id)?;
            record.synced = true;
            records.retain(|r| !r.synced);
            Ok(())
        })?;
        debug!(local_id = %local_id, "Attendance record synced and removed");
        Ok(())
    }

    /// Count a failed delivery attempt. The record stays queued.
    /// Returns the updated record.
    pub fn record_failure(
        &self,
        local_id: &LocalId,
        error: &str,
    ) -> Result<QueuedAttendanceRecord, QueueError> {
        self.update(|records| {
            let record = Self::find(records, local_id)?;
            record.attempts += 1;
            record.last_error = Some(error.to_string());
            Ok(record.clone())
        })
    }

    /// Count a delivery attempt without recording an error, for a record the
    /// server accepted but that could not be dequeued.
    pub fn record_attempt(&self, local_id: &LocalId) -> Result<(), QueueError> {
        self.update(|records| {
            Self::find(records, local_id)?.attempts += 1;
            Ok(())
        })
    }

    /// Hold the record back until `at`.
    pub fn defer_until(&self, local_id: &LocalId, at: DateTime<Utc>) -> Result<(), QueueError> {
        self.update(|records| {
            Self::find(records, local_id)?.next_attempt_at = Some(at);
            Ok(())
        })
    }

    /// Stop retrying automatically; the record is kept for manual follow-up.
    pub fn mark_needs_attention(&self, local_id: &LocalId) -> Result<(), QueueError> {
        self.update(|records| {
            Self::find(records, local_id)?.needs_attention = true;
            Ok(())
        })
    }

    /// User-initiated retry: clear the parked state and any backoff.
    /// Attempt history is kept.
    pub fn requeue(&self, local_id: &LocalId) -> Result<(), QueueError> {
        self.update(|records| {
            let record = Self::find(records, local_id)?;
            record.needs_attention = false;
            record.next_attempt_at = None;
            Ok(())
        })?;
        info!(local_id = %local_id, "Attendance record requeued");
        Ok(())
    }
}
