use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::Collection;
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub key: String,
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(key: impl Into<String>, data: T) -> Self {
        Self {
            key: key.into(),
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew (negative ages)
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Namespaced cache of server documents.
///
/// Reads never fail: a missing key, an unreadable document and a document of
/// the wrong shape all come back as `None`. Writes are last-write-wins and
/// storage failures are logged, not returned.
#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn Storage>,
    namespace: String,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn Storage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}_{}", self.namespace, key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let physical = self.physical_key(key);
        let contents = match self.storage.get(&physical) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!(cache = key, "Cache miss");
                return None;
            }
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str::<CachedData<T>>(&contents) {
            Ok(cached) => {
                debug!(cache = key, age = %cached.age_display(), "Cache hit");
                Some(cached)
            }
            Err(e) => {
                debug!(cache = key, error = %e, "Unreadable cache entry, treating as miss");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let cached = CachedData::new(key, value);
        let contents = match serde_json::to_string(&cached) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(cache = key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.physical_key(key), &contents) {
            warn!(cache = key, error = %e, "Failed to write cache entry");
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove(&self.physical_key(key)) {
            warn!(cache = key, error = %e, "Failed to remove cache entry");
        }
    }

    /// Human-readable age of an entry without decoding its payload.
    pub fn age(&self, key: &str) -> Option<String> {
        self.get::<IgnoredAny>(key).map(|cached| cached.age_display())
    }

    pub fn get_cache_ages(&self) -> CacheAges {
        CacheAges {
            sessions: self.age(Collection::Sessions.cache_key()),
            students: self.age(Collection::Students.cache_key()),
            fields: self.age(Collection::Fields.cache_key()),
            reports: self.age(Collection::Reports.cache_key()),
            dashboard: self.age(Collection::DashboardStats.cache_key()),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub sessions: Option<String>,
    pub students: Option<String>,
    pub fields: Option<String>,
    pub reports: Option<String>,
    pub dashboard: Option<String>,
}

impl CacheAges {
    /// `(collection name, age)` for every cached collection
    pub fn entries(&self) -> [(&'static str, Option<&str>); 5] {
        [
            (Collection::Sessions.name(), self.sessions.as_deref()),
            (Collection::Students.name(), self.students.as_deref()),
            (Collection::Fields.name(), self.fields.as_deref()),
            (Collection::Reports.name(), self.reports.as_deref()),
            (Collection::DashboardStats.name(), self.dashboard.as_deref()),
        ]
    }

    /// First known age among the collections a roll call depends on
    pub fn last_updated(&self) -> String {
        [&self.sessions, &self.students, &self.dashboard]
            .into_iter()
            .find_map(|age| age.clone())
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
