//! Integration tests for the dock state file
//!
//! These tests exercise the store the way the controller does across
//! restarts: save after a transition, then load from a fresh store.
//!
//! Run with: cargo test --package bikedock-storage --test state_file

use bikedock_core::BikeId;
use bikedock_storage::{PersistedState, StateStore, StateStoreConfig};

fn config_in(dir: &tempfile::TempDir) -> StateStoreConfig {
    StateStoreConfig::new(dir.path().join("dock_state"))
}

#[tokio::test]
async fn test_restart_reproduces_occupant() {
    let dir = tempfile::tempdir().unwrap();
    let bike = BikeId::new("BIKE123").unwrap();

    {
        let store = StateStore::new(config_in(&dir)).unwrap();
        assert_eq!(store.load().await, PersistedState::empty());
        store
            .save(&PersistedState::occupied(bike.clone()))
            .await
            .unwrap();
    }

    let store = StateStore::new(config_in(&dir)).unwrap();
    assert_eq!(store.load().await.bike_id, Some(bike));
}

#[tokio::test]
async fn test_stale_tmp_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(config_in(&dir)).unwrap();
    store
        .save(&PersistedState::occupied(BikeId::new("BIKE7").unwrap()))
        .await
        .unwrap();

    // leftover from a write interrupted before its rename
    std::fs::write(dir.path().join("dock_state.tmp"), r#"{"bike_id":"BIK"#).unwrap();

    let state = StateStore::new(config_in(&dir)).unwrap().load().await;
    assert_eq!(state.bike_id.unwrap().as_str(), "BIKE7");

    // the next save overwrites the leftover
    store.save(&PersistedState::empty()).await.unwrap();
    assert_eq!(store.load().await, PersistedState::empty());
}

#[tokio::test]
async fn test_hand_written_file_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("dock_state"),
        "{ \"bike_id\" : \"6A004A1589BC\" }\n",
    )
    .unwrap();

    let state = StateStore::new(config_in(&dir)).unwrap().load().await;
    assert_eq!(state.bike_id.unwrap().as_str(), "6A004A1589BC");
}
