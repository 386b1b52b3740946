//! Durable storage of the wizard snapshot.
//!
//! The snapshot lives as JSON under a single key. Failures here degrade
//! durability only; nothing in this module ever reports an error upwards.

use serde::{Deserialize, Serialize};
use vibe_client::{KeyValueStore, StorageError};
use vibe_core::{WizardSnapshot, DEFAULT_BRANCH};
use vibe_logging::{vibe_error, vibe_info, vibe_warn};

pub const STATE_KEY: &str = "workflowState";
/// Keys sharing this prefix are sacrificed when space runs out.
const KEY_PREFIX: &str = "workflow";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PersistedWizard {
    current_step: u8,
    repo_url: String,
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    vibe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refined_vibe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    planner_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_commit_sha: Option<String>,
}

impl Default for PersistedWizard {
    fn default() -> Self {
        WizardSnapshot::default().into()
    }
}

impl From<WizardSnapshot> for PersistedWizard {
    fn from(snapshot: WizardSnapshot) -> Self {
        Self {
            current_step: snapshot.current_step,
            repo_url: snapshot.repo_url,
            branch: snapshot.branch,
            vibe: snapshot.vibe,
            refined_vibe: snapshot.refined_vibe,
            planner_output: snapshot.planner_output,
            session_id: snapshot.session_id,
            last_commit_sha: snapshot.last_commit_sha,
        }
    }
}

impl From<PersistedWizard> for WizardSnapshot {
    fn from(persisted: PersistedWizard) -> Self {
        let current_step = if (1..=7).contains(&persisted.current_step) {
            persisted.current_step
        } else {
            1
        };
        let branch = if persisted.branch.trim().is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            persisted.branch
        };
        Self {
            current_step,
            repo_url: persisted.repo_url,
            branch,
            vibe: persisted.vibe,
            refined_vibe: persisted.refined_vibe,
            planner_output: persisted.planner_output,
            session_id: persisted.session_id,
            last_commit_sha: persisted.last_commit_sha,
        }
    }
}

/// How a save ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Full,
    /// Only the identifiers fit after shedding other keys.
    Essential,
    Failed,
}

pub struct SnapshotPersistence<S: KeyValueStore> {
    store: S,
    soft_cap_bytes: u64,
}

impl<S: KeyValueStore> SnapshotPersistence<S> {
    pub fn new(store: S, soft_cap_bytes: u64) -> Self {
        Self {
            store,
            soft_cap_bytes,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save(&mut self, snapshot: &WizardSnapshot) -> SaveOutcome {
        match self.write(snapshot) {
            Ok(()) => SaveOutcome::Full,
            Err(StorageError::QuotaExceeded { needed, quota }) => {
                vibe_warn!(
                    "Snapshot needs {} bytes of a {} byte quota; keeping identifiers only",
                    needed,
                    quota
                );
                self.shed_other_keys();
                match self.write(&snapshot.essential()) {
                    Ok(()) => SaveOutcome::Essential,
                    Err(err) => {
                        vibe_error!("Could not persist even the essential snapshot: {}", err);
                        SaveOutcome::Failed
                    }
                }
            }
            Err(err) => {
                vibe_error!("Failed to persist snapshot: {}", err);
                SaveOutcome::Failed
            }
        }
    }

    /// Never fails; corrupted data is dropped and defaults returned.
    pub fn load(&mut self) -> WizardSnapshot {
        let raw = match self.store.get(STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return WizardSnapshot::default(),
            Err(err) => {
                vibe_warn!("Failed to read saved state: {}", err);
                return WizardSnapshot::default();
            }
        };

        match serde_json::from_str::<PersistedWizard>(&raw) {
            Ok(persisted) => persisted.into(),
            Err(err) => {
                vibe_warn!("Discarding corrupted saved state: {}", err);
                if let Err(err) = self.store.remove(STATE_KEY) {
                    vibe_warn!("Failed to remove corrupted state: {}", err);
                }
                WizardSnapshot::default()
            }
        }
    }

    pub fn clear(&mut self) {
        if let Err(err) = self.store.remove(STATE_KEY) {
            vibe_warn!("Failed to clear saved state: {}", err);
        }
    }

    /// Start-up housekeeping. Returns how many keys were removed.
    pub fn compact(&mut self) -> usize {
        let total = match self.store.total_size() {
            Ok(total) => total,
            Err(err) => {
                vibe_warn!("Failed to measure state storage: {}", err);
                return 0;
            }
        };
        if total <= self.soft_cap_bytes {
            return 0;
        }
        vibe_info!(
            "State storage at {} bytes exceeds {} byte soft cap; compacting",
            total,
            self.soft_cap_bytes
        );
        self.shed_other_keys()
    }

    fn write(&mut self, snapshot: &WizardSnapshot) -> Result<(), StorageError> {
        let persisted = PersistedWizard::from(snapshot.clone());
        let json = serde_json::to_string(&persisted)
            .map_err(|err| StorageError::Io(std::io::Error::other(err)))?;
        self.store.set(STATE_KEY, &json)
    }

    fn shed_other_keys(&mut self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                vibe_warn!("Failed to list state keys: {}", err);
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys
            .iter()
            .filter(|key| key.starts_with(KEY_PREFIX) && key.as_str() != STATE_KEY)
        {
            match self.store.remove(key) {
                Ok(()) => removed += 1,
                Err(err) => vibe_warn!("Failed to remove {}: {}", key, err),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vibe_client::{FileStore, MemoryStore, StoreSettings};

    fn full_snapshot() -> WizardSnapshot {
        WizardSnapshot {
            current_step: 3,
            repo_url: "https://github.com/acme/widgets".to_string(),
            branch: "dev".to_string(),
            vibe: Some("Add dark mode to the settings page".repeat(10)),
            refined_vibe: Some("Implement a dark theme toggle".to_string()),
            planner_output: None,
            session_id: Some("sess-1".to_string()),
            last_commit_sha: Some("abc1234def".to_string()),
        }
    }

    /// Records the size of every write attempt before delegating.
    struct RecordingStore {
        inner: MemoryStore,
        attempts: Vec<usize>,
    }

    impl KeyValueStore for RecordingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.attempts.push(value.len());
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.inner.keys()
        }

        fn total_size(&self) -> Result<u64, StorageError> {
            self.inner.total_size()
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut persistence = SnapshotPersistence::new(MemoryStore::new(), 4096);
        assert_eq!(persistence.save(&full_snapshot()), SaveOutcome::Full);
        assert_eq!(persistence.load(), full_snapshot());
    }

    #[test]
    fn saved_json_uses_camel_case_keys() {
        let mut persistence = SnapshotPersistence::new(MemoryStore::new(), 4096);
        persistence.save(&full_snapshot());
        let raw = persistence.store().get(STATE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["currentStep"], 3);
        assert_eq!(value["repoUrl"], "https://github.com/acme/widgets");
        assert_eq!(value["lastCommitSha"], "abc1234def");
        assert!(value.get("plannerOutput").is_none());
    }

    #[test]
    fn load_without_saved_state_gives_defaults() {
        let mut persistence = SnapshotPersistence::new(MemoryStore::new(), 4096);
        assert_eq!(persistence.load(), WizardSnapshot::default());
    }

    #[test]
    fn load_fills_missing_fields_and_clamps_step() {
        let mut store = MemoryStore::new();
        store
            .set(STATE_KEY, r#"{"currentStep":42,"repoUrl":"https://github.com/a/b","extra":true}"#)
            .unwrap();
        let mut persistence = SnapshotPersistence::new(store, 4096);
        let snapshot = persistence.load();
        assert_eq!(snapshot.current_step, 1);
        assert_eq!(snapshot.branch, "main");
        assert_eq!(snapshot.repo_url, "https://github.com/a/b");
        assert_eq!(snapshot.vibe, None);
    }

    #[test]
    fn corrupted_state_is_removed() {
        let mut store = MemoryStore::new();
        store.set(STATE_KEY, "{not json").unwrap();
        let mut persistence = SnapshotPersistence::new(store, 4096);
        assert_eq!(persistence.load(), WizardSnapshot::default());
        assert_eq!(persistence.store().get(STATE_KEY).unwrap(), None);
    }

    #[test]
    fn quota_failure_retries_with_smaller_payload() {
        let full_len = serde_json::to_string(&PersistedWizard::from(full_snapshot()))
            .unwrap()
            .len();
        let essential_len =
            serde_json::to_string(&PersistedWizard::from(full_snapshot().essential()))
                .unwrap()
                .len();
        let quota = (STATE_KEY.len() + essential_len + 20) as u64;
        assert!(((STATE_KEY.len() + full_len) as u64) > quota);

        let mut inner = MemoryStore::with_quota(quota);
        inner.set("workflowDraft", "x").unwrap();
        let mut persistence = SnapshotPersistence::new(
            RecordingStore {
                inner,
                attempts: Vec::new(),
            },
            quota,
        );

        assert_eq!(persistence.save(&full_snapshot()), SaveOutcome::Essential);
        let attempts = &persistence.store().attempts;
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1] < attempts[0]);
        assert_eq!(persistence.store().keys().unwrap(), vec![STATE_KEY.to_string()]);

        let restored = persistence.load();
        assert_eq!(restored, full_snapshot().essential());
    }

    #[test]
    fn hopeless_quota_fails_quietly() {
        let mut persistence = SnapshotPersistence::new(MemoryStore::with_quota(8), 8);
        assert_eq!(persistence.save(&full_snapshot()), SaveOutcome::Failed);
        assert_eq!(persistence.load(), WizardSnapshot::default());
    }

    #[test]
    fn clear_removes_state() {
        let mut persistence = SnapshotPersistence::new(MemoryStore::new(), 4096);
        persistence.save(&full_snapshot());
        persistence.clear();
        assert_eq!(persistence.store().get(STATE_KEY).unwrap(), None);
    }

    #[test]
    fn compact_only_acts_above_soft_cap() {
        let mut store = MemoryStore::new();
        store.set("workflowOld", &"y".repeat(64)).unwrap();
        store.set("rulesSelection", "[]").unwrap();
        let mut persistence = SnapshotPersistence::new(store, 1024);
        assert_eq!(persistence.compact(), 0);

        let mut store = MemoryStore::new();
        store.set("workflowOld", &"y".repeat(64)).unwrap();
        store.set("rulesSelection", "[]").unwrap();
        let mut persistence = SnapshotPersistence::new(store, 16);
        persistence.save(&WizardSnapshot::default());
        assert_eq!(persistence.compact(), 1);
        let mut keys = persistence.store().keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["rulesSelection".to_string(), STATE_KEY.to_string()]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings::default();
        let store = FileStore::open(dir.path().to_path_buf(), settings).unwrap();
        let mut persistence = SnapshotPersistence::new(store, settings.soft_cap_bytes);
        persistence.save(&full_snapshot());

        let store = FileStore::open(dir.path().to_path_buf(), settings).unwrap();
        let mut reopened = SnapshotPersistence::new(store, settings.soft_cap_bytes);
        assert_eq!(reopened.load(), full_snapshot());
    }
}
