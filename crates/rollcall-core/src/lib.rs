//! Offline-first core for the rollcall attendance app.
//!
//! Roll calls are written to a durable [`PendingQueue`] before any network
//! call and drained by the [`SyncEngine`], which removes a record only once
//! the server confirms it. Reads go through the [`DataLoader`], which falls
//! back to the [`LocalStore`] cache when the server cannot be reached.
//! Connectivity changes reported to the [`ConnectivityMonitor`] trigger a
//! debounced flush.

pub mod api;
pub mod cache;
pub mod config;
pub mod loader;
pub mod models;
pub mod queue;
pub mod recorder;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, AttendanceSubmission, Collection, ReadQuery, RemoteClient};
pub use cache::{CacheAges, CachedData, LocalStore};
pub use config::Config;
pub use loader::{DataLoader, DataSource, Loaded};
pub use queue::{LocalId, NewAttendanceRecord, PendingQueue, QueueError, QueuedAttendanceRecord};
pub use recorder::{AttendanceRecorder, RecordError, RollCallEntry, RollCallOutcome};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use sync::{
    ConnectivityMonitor, NetworkStatus, RetryPolicy, SyncEngine, SyncOptions, SyncState,
    SyncSummary,
};
