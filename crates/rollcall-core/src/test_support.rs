//! Scripted `RemoteClient` for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::api::{ApiError, AttendanceSubmission, Collection, ReadQuery, RemoteClient};
use crate::queue::{IdempotencyKey, NewAttendanceRecord, PendingQueue};
use crate::storage::MemoryStorage;

/// Behaves like the attendance server: accepts submissions, ignores
/// duplicates of the same idempotency key, and can be told to go offline,
/// reject particular students, or answer slowly.
#[derive(Default)]
pub struct FakeRemote {
    send_calls: AtomicUsize,
    stored: Mutex<HashMap<IdempotencyKey, bool>>,
    rejected_students: Mutex<HashSet<String>>,
    offline: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
    documents: Mutex<HashMap<Collection, Value>>,
    fetch_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn reject_student(&self, student_id: &str) {
        self.rejected_students.lock().unwrap().insert(student_id.to_string());
    }

    pub fn accept_all(&self) {
        self.rejected_students.lock().unwrap().clear();
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn serve(&self, collection: Collection, document: Value) {
        self.documents.lock().unwrap().insert(collection, document);
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Distinct records the server holds, keyed by idempotency key
    pub fn stored(&self) -> HashMap<IdempotencyKey, bool> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn send(&self, submission: &AttendanceSubmission) -> Result<(), ApiError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::NetworkError("connection refused".to_string()));
        }
        if self.rejected_students.lock().unwrap().contains(&submission.student_id) {
            return Err(ApiError::Validation(format!(
                "Unknown student {}",
                submission.student_id
            )));
        }
        self.stored
            .lock()
            .unwrap()
            .insert(submission.idempotency_key(), submission.is_present);
        Ok(())
    }

    async fn fetch(&self, query: &ReadQuery) -> Result<Value, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::NetworkError("connection refused".to_string()));
        }
        self.documents
            .lock()
            .unwrap()
            .get(&query.collection)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(query.collection.endpoint().to_string()))
    }
}

pub fn memory_queue() -> (Arc<MemoryStorage>, Arc<PendingQueue>) {
    let storage = Arc::new(MemoryStorage::new());
    let queue = Arc::new(PendingQueue::new(storage.clone(), "rollcall"));
    (storage, queue)
}

pub fn attendance(session_id: &str, student_id: &str, is_present: bool) -> NewAttendanceRecord {
    NewAttendanceRecord {
        session_id: session_id.to_string(),
        student_id: student_id.to_string(),
        is_present,
        timestamp: Utc::now(),
    }
}
