//! Durable write-ahead queue of attendance submissions.
//!
//! Records are appended when a roll call is submitted and leave the queue
//! only once the server has confirmed them. Delivery is at-least-once; the
//! server deduplicates on `(session_id, student_id, timestamp)`.

pub mod pending;
pub mod record;

pub use pending::{PendingQueue, ATTENDANCE_QUEUE_KEY};
pub use record::{IdempotencyKey, LocalId, NewAttendanceRecord, QueuedAttendanceRecord};

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Attendance queue document is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("No queued record with id {0}")]
    NotFound(LocalId),
}
