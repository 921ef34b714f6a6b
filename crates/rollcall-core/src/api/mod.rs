//! REST API module for the attendance service.
//!
//! This module provides:
//! - `RemoteClient`: the capability the sync engine and loader depend on
//! - `ApiClient`: the HTTP implementation against the PHP endpoints
//! - `ApiError`: failures, split into transient and permanent
//!
//! Every endpoint answers JSON; a non-success status or a body that does not
//! parse is a failure.

pub mod client;
pub mod error;
pub mod remote;

pub use client::ApiClient;
pub use error::ApiError;
pub use remote::{AttendanceSubmission, Collection, ReadQuery, RemoteClient};
