use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts")]
use ts_rs::TS;
use uuid::Uuid;

use crate::api::AttendanceSubmission;

/// Queue-local identifier, assigned at enqueue time and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A presence decision as collected by the UI, before it is queued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub session_id: String,
    pub student_id: String,
    pub is_present: bool,
    pub timestamp: DateTime<Utc>,
}

/// The triple the server uses to recognise a duplicate submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub session_id: String,
    pub student_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct QueuedAttendanceRecord {
    pub local_id: LocalId,
    pub session_id: String,
    pub student_id: String,
    pub is_present: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Earliest time the record may be retried; `None` means immediately
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Set once the retry cap is hit. The record stays queued.
    #[serde(default)]
    pub needs_attention: bool,
}

impl QueuedAttendanceRecord {
    pub(crate) fn from_new(local_id: LocalId, record: NewAttendanceRecord) -> Self {
        Self {
            local_id,
            session_id: record.session_id,
            student_id: record.student_id,
            is_present: record.is_present,
            timestamp: record.timestamp,
            synced: false,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            needs_attention: false,
        }
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        AttendanceSubmission::from(self).idempotency_key()
    }

    /// Whether a flush at `now` should attempt this record
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.synced
            && !self.needs_attention
            && self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> QueuedAttendanceRecord {
        QueuedAttendanceRecord::from_new(
            LocalId::generate(),
            NewAttendanceRecord {
                session_id: "session-1".to_string(),
                student_id: "student-1".to_string(),
                is_present: true,
                timestamp: Utc::now(),
            },
        )
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = LocalId::generate();
        let b = LocalId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut r = record();
        assert!(r.is_due(now));

        r.next_attempt_at = Some(now + Duration::seconds(30));
        assert!(!r.is_due(now));
        assert!(r.is_due(now + Duration::seconds(30)));

        r.next_attempt_at = None;
        r.needs_attention = true;
        assert!(!r.is_due(now));
    }

    #[test]
    fn test_older_documents_default_new_fields() {
        // Shape written by the web client: no retry bookkeeping at all
        let json = r#"{"localId":"abc","sessionId":"session-1","studentId":"student-1","isPresent":false,"timestamp":"2026-03-02T08:15:00.000Z","synced":false}"#;
        let r: QueuedAttendanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.local_id, LocalId::from("abc"));
        assert_eq!(r.attempts, 0);
        assert_eq!(r.last_error, None);
        assert!(!r.needs_attention);
    }
}
