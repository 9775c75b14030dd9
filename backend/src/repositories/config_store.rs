use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("storage quota exceeded: {needed} bytes needed, {capacity} available")]
    QuotaExceeded { needed: usize, capacity: usize },
    #[error("invalid store key '{0}'")]
    InvalidKey(String),
    #[error("config store I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Durable local key-value store holding whole serialized values.
pub trait LocalConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError>;
}

/// One `<key>.json` file per key under `dir`; total size across keys is capped at `capacity` bytes.
pub struct FileConfigStore {
    dir: PathBuf,
    capacity: usize,
}

impl FileConfigStore {
    pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, ConfigStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, capacity })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ConfigStoreError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Bytes used by every key except `skip`.
    fn used_by_others(&self, skip: &Path) -> Result<usize, ConfigStoreError> {
        let mut total = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path == skip || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            total += entry.metadata()?.len() as usize;
        }
        Ok(total)
    }
}

impl LocalConfigStore for FileConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigStoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(key, bytes = text.len(), "Read local config entry");
                Ok(Some(text))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        let path = self.path_for(key)?;
        let needed = self.used_by_others(&path)? + value.len();
        if needed > self.capacity {
            return Err(ConfigStoreError::QuotaExceeded {
                needed,
                capacity: self.capacity,
            });
        }

        // write-then-rename so a crash never leaves a half-written entry
        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(key, bytes = value.len(), "Wrote local config entry");
        Ok(())
    }
}
