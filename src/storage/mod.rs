//! Flat key/value persistence
//!
//! Settings, runtime state, tasks and streak data are each stored as one
//! JSON document under a fixed key.

pub mod file;
pub mod memory;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::StoreError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

pub const TIMER_SETTINGS_KEY: &str = "timerSettings";
pub const TIMER_STATE_KEY: &str = "timerState";
pub const TASKS_KEY: &str = "tasks";
pub const ACTIVE_TASK_KEY: &str = "activeTaskId";
pub const STREAK_KEY: &str = "pomodoroStreak";

/// Persisted key/value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &json)
}
