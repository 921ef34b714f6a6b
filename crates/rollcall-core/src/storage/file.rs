use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{Storage, StorageError};

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temp file that is fsynced and then renamed over the target,
/// so a crash mid-write leaves either the old or the new document, never a
/// truncated one.
pub struct FileStorage {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !Self::is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Keys become file names, so only a conservative character set is allowed.
    fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    }

    /// Write `value` to `temp_path`, fsync, then rename over `path`.
    /// The caller removes `temp_path` on error.
    fn write_atomic(temp_path: &Path, path: &Path, value: &str) -> std::io::Result<()> {
        let mut file = File::create(temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(temp_path, path)
    }

    fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key)(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let temp_path = self.dir.join(format!("{}.json.{}.tmp", key, std::process::id()));

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(e) = Self::write_atomic(&temp_path, &path, value) {
            let _ = fs::remove_file(&temp_path);
            return Err(Self::io_error(key)(e));
        }

        debug!(key = key, bytes = value.len(), "Wrote storage document");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key)(e)),
        }
    }
}
