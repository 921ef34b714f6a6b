//! Local caching module for offline data access.
//!
//! This module provides the `LocalStore` for keeping the last successful
//! server response for each collection. It is a fallback, not a source of
//! truth: entries never expire and are overwritten on every live fetch.
//!
//! Cached collections:
//! - Current sessions (with their student lists)
//! - Students, Fields
//! - Absentee reports
//! - Dashboard stats

pub mod store;

pub use store::{CacheAges, CachedData, LocalStore};
