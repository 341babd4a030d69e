//! Persistence gateway
//!
//! Owns the named entries in the key-value store. Reads never fail the
//! application: a missing entry is "no data yet" and malformed JSON is
//! logged and treated as absent. Writes return their error to the caller;
//! in-memory state stays authoritative whether or not a save lands.

use serde_json::Value;
use tracing::warn;

use crate::collection::Collection;
use crate::constants::storage;
use crate::settings::Settings;
use crate::storage::kv::{KeyValueStore, StorageError};

/// Raw persisted entries, parsed to JSON but not yet shaped
#[derive(Debug, Default)]
pub struct RawState {
    pub legacy_counters: Option<Value>,
    pub collections: Option<Value>,
    pub settings: Option<Value>,
}

pub struct PersistenceGateway {
    store: Box<dyn KeyValueStore>,
}

impl PersistenceGateway {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read all persisted entries. Never fails: unreadable or malformed
    /// entries degrade to absent.
    pub fn load(&self) -> RawState {
        RawState {
            legacy_counters: self.read_entry(storage::LEGACY_COUNTERS_KEY),
            collections: self.read_entry(storage::COLLECTIONS_KEY),
            settings: self.read_entry(storage::SETTINGS_KEY),
        }
    }

    fn read_entry(&self, key: &str) -> Option<Value> {
        let contents = match self.store.get(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(error) => {
                warn!(key = %key, error = %error, "failed to read entry, treating as absent");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(key = %key, error = %error, "malformed entry, treating as absent");
                None
            }
        }
    }

    pub fn save_collections(&mut self, collections: &[Collection]) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(collections)?;
        self.store.put(storage::COLLECTIONS_KEY, &serialized)
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(settings)?;
        self.store.put(storage::SETTINGS_KEY, &serialized)
    }

    /// Remove the pre-collections entry so legacy migration never re-runs
    pub fn erase_legacy(&mut self) -> Result<(), StorageError> {
        self.store.remove(storage::LEGACY_COUNTERS_KEY)
    }
}
