use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Storage, StorageError};

/// In-memory storage. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_next_writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`remove` fail, to simulate a full or
    /// read-only disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make only the next `count` writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next_writes.store(count, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self, key: &str) -> Result<(), StorageError> {
        let one_shot = self
            .fail_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.fail_writes.load(Ordering::SeqCst) || one_shot {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "writes disabled"),
            });
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable(key)?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable(key)?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_writes_is_one_shot() {
        let storage = MemoryStorage::new();
        storage.fail_next_writes(1);

        assert!(storage.set("k", "1").is_err());
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("2"));
    }
}
