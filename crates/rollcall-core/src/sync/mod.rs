//! Queue draining and connectivity tracking.

pub mod engine;
pub mod monitor;
pub mod policy;

pub use engine::{SyncEngine, SyncOptions, SyncState, SyncSummary, DEFAULT_SUBMIT_TIMEOUT};
pub use monitor::{ConnectivityMonitor, NetworkStatus, DEFAULT_DEBOUNCE};
pub use policy::RetryPolicy;
