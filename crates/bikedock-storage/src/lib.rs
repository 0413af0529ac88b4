//! Storage layer for the bike dock.
//!
//! The dock keeps exactly one durable fact: which bike, if any, is docked.
//! It lives in a small JSON file read once at startup and rewritten after
//! every accepted check-in or check-out.
//!
//! # Example
//!
//! ```no_run
//! use bikedock_storage::{PersistedState, StateStore, StateStoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StateStore::new(StateStoreConfig::default())?;
//!
//! // Missing or corrupt files load as an empty dock
//! let state = store.load().await;
//! if state.bike_id.is_none() {
//!     store.save(&PersistedState::empty()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{PersistedState, StateStore, StateStoreConfig};
