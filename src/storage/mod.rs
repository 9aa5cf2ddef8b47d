//! Durable key-value persistence for session state.
//!
//! Everything the client must remember across restarts (tokens, user
//! record, profile set, active profile) goes through `KeyValueStore`.
//! Values are text; structured values are JSON-encoded by the helpers
//! below.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Stored value for {key} is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// A process-wide durable string map.
///
/// Implementations must make `remove_many` atomic: either every key is
/// gone afterwards or none is.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key])
    }
}

/// Read and decode a JSON value. Absent key → `None`.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
    }
}

/// Encode and write a JSON value.
pub fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_helpers_round_trip_through_store() {
        let store = MemoryStore::new();
        set_json(&store, "numbers", &vec![3, 1, 2]).unwrap();
        let back: Option<Vec<i32>> = get_json(&store, "numbers").unwrap();
        assert_eq!(back, Some(vec![3, 1, 2]));
    }

    #[test]
    fn missing_key_decodes_to_none() {
        let store = MemoryStore::new();
        let value: Option<Vec<i32>> = get_json(&store, "absent").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn corrupt_value_names_the_key() {
        let store = MemoryStore::new();
        store.set("profiles", "{not json").unwrap();
        let err = get_json::<Vec<i32>>(&store, "profiles").unwrap_err();
        match err {
            StorageError::Corrupt { key, .. } => assert_eq!(key, "profiles"),
            other => panic!("Expected Corrupt, got: {other}"),
        }
    }
}
