//! Durable dock occupancy.
//!
//! The state file holds a single JSON object, `{"bike_id": "BIKE123"}` or
//! `{"bike_id": null}`. Anything else on disk is treated as corrupt.

use crate::error::{StorageError, StorageResult};
use bikedock_core::BikeId;
use bikedock_core::constants::DEFAULT_STATE_FILE;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// On-disk record of the dock occupancy.
///
/// Serialized as `{"bike_id": "BIKE123"}` or `{"bike_id": null}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Bike currently docked, if any
    pub bike_id: Option<BikeId>,
}

impl PersistedState {
    /// State of an empty dock
    pub fn empty() -> Self {
        Self::default()
    }

    /// State of a dock holding `bike_id`
    pub fn occupied(bike_id: BikeId) -> Self {
        Self {
            bike_id: Some(bike_id),
        }
    }
}

/// State file configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateStoreConfig {
    /// Path to the state file
    pub path: PathBuf,

    /// Whether to create missing parent directories on first save
    pub create_dirs: bool,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STATE_FILE),
            create_dirs: true,
        }
    }
}

impl StateStoreConfig {
    /// Create a configuration for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set whether to create missing parent directories
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }
}

/// Durable store for the dock occupancy.
///
/// Has a single writer: the controller. Every save replaces the whole file
/// through a temporary file and a rename, so a crash leaves either the old
/// or the new content on disk.
///
/// # Example
///
/// ```no_run
/// use bikedock_storage::{PersistedState, StateStore, StateStoreConfig};
/// use bikedock_core::BikeId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = StateStore::new(StateStoreConfig::new("/var/lib/bikedock/dock_state"))?;
///
/// store.save(&PersistedState::occupied(BikeId::new("BIKE123")?)).await?;
/// assert!(store.load().await.bike_id.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    tmp_path: PathBuf,
    create_dirs: bool,
}

impl StateStore {
    /// Create a store for the configured file
    ///
    /// Nothing is read or written until [`load`](Self::load) or
    /// [`save`](Self::save) is called.
    pub fn new(config: StateStoreConfig) -> StorageResult<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(StorageError::Configuration(
                "state file path is empty".to_string(),
            ));
        }

        let mut tmp_name: OsString = config.path.clone().into_os_string();
        tmp_name.push(".tmp");

        Ok(Self {
            path: config.path,
            tmp_path: PathBuf::from(tmp_name),
            create_dirs: config.create_dirs,
        })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state.
    ///
    /// A missing file means the dock has never held a bike. An unreadable or
    /// corrupt file is logged and treated the same way.
    pub async fn load(&self) -> PersistedState {
        match self.try_load().await {
            Ok(Some(state)) => {
                info!(path = %self.path.display(), bike_id = ?state.bike_id, "Loaded dock state");
                state
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No dock state file, starting empty");
                PersistedState::empty()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable dock state");
                PersistedState::empty()
            }
        }
    }

    /// Read the persisted state, surfacing errors
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub async fn try_load(&self) -> StorageResult<Option<PersistedState>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // serde would also accept a struct written as a sequence
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&content)?;
        let state = serde_json::from_value(serde_json::Value::Object(object))?;
        Ok(Some(state))
    }

    /// Replace the persisted state
    pub async fn save(&self, state: &PersistedState) -> StorageResult<()> {
        let content = serde_json::to_vec(state)?;

        if self.create_dirs
            && let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&self.tmp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&self.tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), bike_id = ?state.bike_id, "Saved dock state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(StateStoreConfig::new(dir.path().join("dock_state"))).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = StateStoreConfig::default();
        assert_eq!(config.path, PathBuf::from("dock_state"));
        assert!(config.create_dirs);
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = StateStore::new(StateStoreConfig::new(""));
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[test]
    fn test_persisted_state_wire_format() {
        let state = PersistedState::occupied(BikeId::new("BIKE123").unwrap());
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"bike_id":"BIKE123"}"#
        );
        assert_eq!(
            serde_json::to_string(&PersistedState::empty()).unwrap(),
            r#"{"bike_id":null}"#
        );
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.try_load().await.unwrap().is_none());
        assert_eq!(store.load().await, PersistedState::empty());
    }

    #[rstest]
    #[case::not_json("not json at all")]
    #[case::wrong_shape(r#"["BIKE123"]"#)]
    #[case::invalid_bike_id(r#"{"bike_id": ""}"#)]
    #[case::truncated(r#"{"bike_id": "BIK"#)]
    #[case::bare_null("null")]
    #[case::number_for_bike_id(r#"{"bike_id": 123}"#)]
    #[tokio::test]
    async fn test_corrupt_file_loads_empty(#[case] content: &str) {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), content).unwrap();

        assert!(store.try_load().await.is_err());
        assert_eq!(store.load().await, PersistedState::empty());
    }

    #[tokio::test]
    async fn test_save_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .save(&PersistedState::occupied(BikeId::new("BIKE123").unwrap()))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            r#"{"bike_id":"BIKE123"}"#
        );

        store.save(&PersistedState::empty()).await.unwrap();
        assert_eq!(store.load().await, PersistedState::empty());
        assert!(!dir.path().join("dock_state.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var").join("lib").join("dock_state");
        let store = StateStore::new(StateStoreConfig::new(&path)).unwrap();

        store.save(&PersistedState::empty()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_without_parent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("dock_state");
        let store = StateStore::new(StateStoreConfig::new(&path).create_dirs(false)).unwrap();

        let result = store.save(&PersistedState::empty()).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
