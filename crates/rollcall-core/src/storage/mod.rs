//! Persistence capability shared by the local cache and the attendance queue.
//!
//! Everything above this module talks to a `Storage` trait object, never to
//! the filesystem directly:
//! - `FileStorage`: one JSON document per key in a directory, written atomically
//! - `MemoryStorage`: a process-local map, used as the fake in tests

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A namespaced key -> serialized document store.
///
/// Values are opaque strings (JSON documents in practice). `set` replaces the
/// whole value; there is no merge.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a key that does not exist is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
