//! Network-first reads with a cache fallback.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiError, Collection, ReadQuery, RemoteClient};
use crate::cache::{CachedData, LocalStore};
use crate::models::{AbsenteeRecord, DashboardStats, Field, ReportFilters, Session, Student};

/// Where a screen's data came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    /// Fresh from the server; the cache has been refreshed with it
    Live(T),
    /// Server unavailable; last cached copy
    Cached(CachedData<T>),
    /// Server unavailable and nothing cached
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Live,
    Cached,
    Unavailable,
}

impl<T> Loaded<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Loaded::Live(data) => Some(data),
            Loaded::Cached(cached) => Some(&cached.data),
            Loaded::Unavailable => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Loaded::Live(data) => Some(data),
            Loaded::Cached(cached) => Some(cached.data),
            Loaded::Unavailable => None,
        }
    }

    pub fn source(&self) -> DataSource {
        match self {
            Loaded::Live(_) => DataSource::Live,
            Loaded::Cached(_) => DataSource::Cached,
            Loaded::Unavailable => DataSource::Unavailable,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Loaded::Cached(_))
    }

    /// Status line for the screen header
    pub fn describe(&self) -> String {
        match self {
            Loaded::Live(_) => "up to date".to_string(),
            Loaded::Cached(cached) => format!("offline, showing data from {}", cached.age_display()),
            Loaded::Unavailable => "offline, no saved data".to_string(),
        }
    }
}

/// Loads server collections, keeping `LocalStore` in step with every
/// successful read.
#[derive(Clone)]
pub struct DataLoader {
    remote: Arc<dyn RemoteClient>,
    cache: LocalStore,
}

impl DataLoader {
    pub fn new(remote: Arc<dyn RemoteClient>, cache: LocalStore) -> Self {
        Self { remote, cache }
    }

    pub fn cache(&self) -> &LocalStore {
        &self.cache
    }

    async fn fetch_typed<T: DeserializeOwned>(&self, query: &ReadQuery) -> Result<T, ApiError> {
        let document = self.remote.fetch(query).await?;
        serde_json::from_value(document).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Fetch `query`; on success overwrite the collection's cache entry, on
    /// any failure serve the cached copy if there is one.
    pub async fn load<T>(&self, query: ReadQuery) -> Loaded<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let collection = query.collection;
        let key = collection.cache_key();
        match self.fetch_typed::<T>(&query).await {
            Ok(data) => {
                debug!(collection = collection.name(), "Loaded from server");
                self.cache.set(key, &data);
                Loaded::Live(data)
            }
            Err(e) => match self.cache.get::<T>(key) {
                Some(cached) => {
                    warn!(
                        collection = collection.name(),
                        error = %e,
                        age = %cached.age_display(),
                        "Server unavailable, using cached data"
                    );
                    Loaded::Cached(cached)
                }
                None => {
                    warn!(collection = collection.name(), error = %e, "Server unavailable and nothing cached");
                    Loaded::Unavailable
                }
            },
        }
    }

    pub async fn sessions(&self) -> Loaded<Vec<Session>> {
        self.load(ReadQuery::new(Collection::Sessions)).await
    }

    pub async fn students(&self) -> Loaded<Vec<Student>> {
        self.load(ReadQuery::new(Collection::Students)).await
    }

    pub async fn fields(&self) -> Loaded<Vec<Field>> {
        self.load(ReadQuery::new(Collection::Fields)).await
    }

    pub async fn dashboard(&self) -> Loaded<DashboardStats> {
        self.load(ReadQuery::new(Collection::DashboardStats)).await
    }

    /// The cache holds the most recently loaded report, whatever its filters.
    pub async fn absentee_report(&self, filters: &ReportFilters) -> Loaded<Vec<AbsenteeRecord>> {
        self.load(ReadQuery::absentee_report(filters)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_support::FakeRemote;
    use serde_json::json;

    fn loader() -> (Arc<FakeRemote>, DataLoader) {
        let remote = FakeRemote::new();
        let cache = LocalStore::new(Arc::new(MemoryStorage::new()), "rollcall");
        (remote.clone(), DataLoader::new(remote, cache))
    }

    fn sessions_document() -> serde_json::Value {
        json!([{
            "id": "session-1",
            "courseTitle": "Database Systems",
            "courseCode": "CS201",
            "fieldName": "Computer Science",
            "level": "Level 200",
            "students": [{"id": "student-1", "name": "Alice Johnson"}]
        }])
    }

    #[tokio::test]
    async fn test_live_load_refreshes_cache() {
        let (remote, loader) = loader();
        remote.serve(Collection::Sessions, sessions_document());

        let loaded = loader.sessions().await;
        assert_eq!(loaded.source(), DataSource::Live);
        assert_eq!(loaded.describe(), "up to date");
        let sessions = loaded.into_data().unwrap();
        assert_eq!(sessions[0].course_code, "CS201");

        let cached = loader.cache().get::<Vec<Session>>("cached_sessions").unwrap();
        assert_eq!(cached.data, sessions);
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_cache() {
        let (remote, loader) = loader();
        remote.serve(Collection::Sessions, sessions_document());
        loader.sessions().await;

        remote.set_offline(true);
        let loaded = loader.sessions().await;
        assert!(loaded.is_stale());
        assert_eq!(loaded.data().map(|s| s.len()), Some(1));
        assert!(loaded.describe().starts_with("offline, showing data from"));
    }

    #[tokio::test]
    async fn test_offline_without_cache_is_unavailable() {
        let (remote, loader) = loader();
        remote.set_offline(true);

        let loaded = loader.students().await;
        assert_eq!(loaded, Loaded::Unavailable);
        assert!(loaded.data().is_none());
        assert_eq!(remote.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_document_is_a_failure() {
        let (remote, loader) = loader();
        remote.serve(Collection::DashboardStats, json!({"totalStudents": 120}));
        assert_eq!(loader.dashboard().await.source(), DataSource::Live);

        // Wrong shape: keep serving the good copy
        remote.serve(Collection::DashboardStats, json!(["not", "stats"]));
        let loaded = loader.dashboard().await;
        assert_eq!(loaded.source(), DataSource::Cached);
        assert_eq!(loaded.data().map(|d| d.total_students), Some(120));
    }

    #[tokio::test]
    async fn test_absentee_report_uses_reports_cache() {
        let (remote, loader) = loader();
        remote.serve(
            Collection::Reports,
            json!([{
                "id": "session-1-student-2",
                "studentName": "Bob Smith",
                "courseTitle": "Database Systems",
                "date": "2026-03-02T08:15:00Z",
                "sessionId": "session-1"
            }]),
        );

        let loaded = loader.absentee_report(&ReportFilters::today()).await;
        assert_eq!(loaded.data().map(|r| r.len()), Some(1));
        assert!(loader.cache().get::<Vec<AbsenteeRecord>>("cached_reports").is_some());
    }
}
