use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::models::ReportFilters;
use crate::queue::{IdempotencyKey, QueuedAttendanceRecord};

/// Collections the API serves and the cache mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Sessions,
    Students,
    Fields,
    Reports,
    DashboardStats,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Sessions,
        Collection::Students,
        Collection::Fields,
        Collection::Reports,
        Collection::DashboardStats,
    ];

    /// Logical cache key; `LocalStore` adds the namespace prefix
    pub fn cache_key(&self) -> &'static str {
        match self {
            Collection::Sessions => "cached_sessions",
            Collection::Students => "cached_students",
            Collection::Fields => "cached_fields",
            Collection::Reports => "cached_reports",
            Collection::DashboardStats => "cached_dashboard",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Collection::Sessions => "get_current_sessions.php",
            Collection::Students => "get_students.php",
            Collection::Fields => "get_fields.php",
            Collection::Reports => "get_absentee_report.php",
            Collection::DashboardStats => "get_dashboard_stats.php",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Sessions => "sessions",
            Collection::Students => "students",
            Collection::Fields => "fields",
            Collection::Reports => "reports",
            Collection::DashboardStats => "dashboard",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// A read request: which collection, plus query-string parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadQuery {
    pub collection: Collection,
    pub params: Vec<(String, String)>,
}

impl ReadQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            params: Vec::new(),
        }
    }

    pub fn absentee_report(filters: &ReportFilters) -> Self {
        Self {
            collection: Collection::Reports,
            params: filters.to_params(),
        }
    }
}

/// Body of the attendance write endpoint.
///
/// `(session_id, student_id, timestamp)` is the idempotency key: the server
/// ignores a second submission with the same triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSubmission {
    pub session_id: String,
    pub student_id: String,
    pub is_present: bool,
    #[serde(with = "rfc3339_millis")]
    pub timestamp: DateTime<Utc>,
}

impl AttendanceSubmission {
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey {
            session_id: self.session_id.clone(),
            student_id: self.student_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

impl From<&QueuedAttendanceRecord> for AttendanceSubmission {
    fn from(record: &QueuedAttendanceRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            student_id: record.student_id.clone(),
            is_present: record.is_present,
            timestamp: record.timestamp,
        }
    }
}

/// Timestamps go over the wire as `2026-03-02T08:15:00.000Z`, the format the
/// web client has always sent, so retries from either client share one key.
mod rfc3339_millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// What the sync engine and the data loader need from the server.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Deliver one attendance record. `Ok` means the server accepted it.
    async fn send(&self, submission: &AttendanceSubmission) -> Result<(), ApiError>;

    /// Fetch a collection as a raw JSON document.
    async fn fetch(&self, query: &ReadQuery) -> Result<serde_json::Value, ApiError>;
}
