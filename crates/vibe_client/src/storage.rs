use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use vibe_logging::vibe_debug;

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: u64, quota: u64 },
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("state directory missing or not writable: {0}")]
    NotADirectory(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Hard limit on the summed size of all keys and values.
    pub quota_bytes: u64,
    /// Above this total, start-up compaction sheds non-essential keys.
    pub soft_cap_bytes: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            quota_bytes: 5 * 1024 * 1024,
            soft_cap_bytes: 4 * 1024 * 1024,
        }
    }
}

/// String key/value storage with a size quota. Sizes count key plus value
/// bytes for every entry.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
    fn total_size(&self) -> Result<u64, StorageError>;
}

fn check_quota(
    total: u64,
    replaced: u64,
    key: &str,
    value: &str,
    quota: u64,
) -> Result<(), StorageError> {
    let needed = total.saturating_sub(replaced) + (key.len() + value.len()) as u64;
    if needed > quota {
        return Err(StorageError::QuotaExceeded { needed, quota });
    }
    Ok(())
}

/// In-memory store, mainly for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .entries
                .get(key)
                .map_or(0, |old| (key.len() + old.len()) as u64);
            check_quota(self.total_size()?, replaced, key, value, quota)?;
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn total_size(&self) -> Result<u64, StorageError> {
        Ok(self
            .entries
            .iter()
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum())
    }
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), StorageError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StorageError::NotADirectory(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StorageError::NotADirectory(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StorageError::NotADirectory(e.to_string()))?;
    }
    Ok(())
}

/// Atomically writes `{dir}/{filename}` through a temp file and a rename, so
/// readers never see a half-written value.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, StorageError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| StorageError::Io(e.error))?;
        Ok(target)
    }
}

/// One file per key under a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    writer: AtomicFileWriter,
    settings: StoreSettings,
}

impl FileStore {
    pub fn open(dir: PathBuf, settings: StoreSettings) -> Result<Self, StorageError> {
        ensure_state_dir(&dir)?;
        Ok(Self {
            writer: AtomicFileWriter::new(dir.clone()),
            dir,
            settings,
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{ENTRY_EXTENSION}")))
    }

    fn entries(&self) -> Result<Vec<(String, u64)>, StorageError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let meta = entry.metadata()?;
            if meta.is_file() {
                entries.push((key.to_string(), key.len() as u64 + meta.len()));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let entries = self.entries()?;
        let total = entries.iter().map(|(_, size)| size).sum();
        let replaced = entries
            .iter()
            .find(|(name, _)| name == key)
            .map_or(0, |(_, size)| *size);
        check_quota(total, replaced, key, value, self.settings.quota_bytes)?;

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        let written = self.writer.write(filename, value)?;
        vibe_debug!("Stored {} bytes at {}", value.len(), written.display());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    fn total_size(&self) -> Result<u64, StorageError> {
        Ok(self.entries()?.iter().map(|(_, size)| size).sum())
    }
}
