//! Collection/counter store
//!
//! The authoritative in-memory state: the collection list and the active
//! reference. Every mutation validates at the boundary, computes a fresh
//! collection list, and hands the result to the persistence gateway. A
//! failed save never invalidates in-memory state; the worst case is
//! "changes may not persist".

use thiserror::Error;
use tracing::{debug, warn};

use crate::collection::Collection;
use crate::counter::{Counter, CounterOp};
use crate::identity::{Clock, IdSource};
use crate::migrate::{self, RestoredFrom};
use crate::settings::Settings;
use crate::storage::{PersistenceGateway, StorageError};

/// Non-blocking persistence warning, drained by the UI after each command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveWarning {
    #[error("storage full, changes may not persist")]
    StorageFull,
    #[error("saving failed, changes may not persist: {0}")]
    Failed(String),
}

pub struct TrackerStore {
    gateway: PersistenceGateway,
    collections: Vec<Collection>,
    active_id: String,
    settings_extra: serde_json::Map<String, serde_json::Value>,
    ids: Box<dyn IdSource>,
    clock: Box<dyn Clock>,
    switch_listener: Option<Box<dyn FnMut()>>,
    save_warning: Option<SaveWarning>,
}

impl TrackerStore {
    /// Load persisted state through the migrator and, when a migration or
    /// fresh start produced new state, write it back immediately so the
    /// next launch finds current-shape data.
    pub fn open(
        gateway: PersistenceGateway,
        mut ids: Box<dyn IdSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let raw = gateway.load();
        let restored = migrate::restore(raw, ids.as_mut(), clock.as_ref());

        let mut store = Self {
            gateway,
            collections: restored.collections,
            active_id: restored.active_id,
            settings_extra: restored.settings_extra,
            ids,
            clock,
            switch_listener: None,
            save_warning: None,
        };

        match restored.source {
            RestoredFrom::Current => {}
            RestoredFrom::Legacy => {
                if let Err(error) = store.gateway.erase_legacy() {
                    warn!(error = %error, "failed to erase legacy entry");
                }
                store.persist_collections();
                store.persist_settings();
            }
            RestoredFrom::Empty => {
                store.persist_collections();
                store.persist_settings();
            }
        }

        store
    }

    // ==========================================================================
    // Read surface
    // ==========================================================================

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn active_collection_id(&self) -> &str {
        &self.active_id
    }

    pub fn active_collection(&self) -> &Collection {
        self.collections
            .iter()
            .find(|c| c.id == self.active_id)
            .expect("store always holds the active collection")
    }

    pub fn active_counters(&self) -> &[Counter] {
        &self.active_collection().counters
    }

    /// Take the pending persistence warning, if any. Non-blocking: state
    /// mutations succeed in memory whether or not their save landed.
    pub fn take_save_warning(&mut self) -> Option<SaveWarning> {
        self.save_warning.take()
    }

    /// Collaborators register here to drop transient UI state (open forms,
    /// unsaved drafts) whenever the active collection changes.
    pub fn set_switch_listener(&mut self, listener: Box<dyn FnMut()>) {
        self.switch_listener = Some(listener);
    }

    // ==========================================================================
    // Counter operations (active collection)
    // ==========================================================================

    pub fn add_counter(&mut self, label: &str, max_input: Option<&str>, default_input: Option<&str>) {
        let Some(counter) =
            Counter::from_input(self.ids.as_mut(), label, max_input, default_input)
        else {
            return;
        };
        let mut counters = self.active_counters().to_vec();
        counters.push(counter);
        self.commit_active_counters(counters);
    }

    pub fn remove_counter(&mut self, counter_id: &str) {
        let counters = self.active_counters();
        if !counters.iter().any(|c| c.id == counter_id) {
            debug!(counter = %counter_id, "remove ignored: unknown counter");
            return;
        }
        let counters = counters
            .iter()
            .filter(|c| c.id != counter_id)
            .cloned()
            .collect();
        self.commit_active_counters(counters);
    }

    /// Apply increment/decrement/reset to one counter. A value already at
    /// its bound is not a state transition: nothing is bumped or saved.
    pub fn update_counter_value(&mut self, counter_id: &str, op: CounterOp) {
        let counters = self.active_counters();
        if !counters.iter().any(|c| c.id == counter_id) {
            debug!(counter = %counter_id, "update ignored: unknown counter");
            return;
        }
        let next: Vec<Counter> = counters
            .iter()
            .map(|c| if c.id == counter_id { op.apply(c) } else { c.clone() })
            .collect();
        if next.as_slice() == self.active_counters() {
            debug!(counter = %counter_id, op = ?op, "value already at its bound");
            return;
        }
        self.commit_active_counters(next);
    }

    pub fn reset_all(&mut self) {
        let next: Vec<Counter> = self.active_counters().iter().map(Counter::reset).collect();
        if next.as_slice() == self.active_counters() {
            return;
        }
        self.commit_active_counters(next);
    }

    // ==========================================================================
    // Collection operations
    // ==========================================================================

    pub fn create_collection(&mut self, name: &str, duplicate_from: Option<&str>) {
        let name = name.trim();
        if name.is_empty() {
            debug!("create ignored: empty collection name");
            return;
        }

        let now = self.clock.now_millis();
        let collection = match duplicate_from {
            Some(source_id) => {
                let Some(source) = self.collections.iter().find(|c| c.id == source_id).cloned()
                else {
                    debug!(source = %source_id, "duplicate ignored: unknown source collection");
                    return;
                };
                let id = self.ids.next_id();
                Collection::duplicate_from(&source, id, name, now, self.ids.as_mut())
            }
            None => Collection::new(self.ids.next_id(), name, now),
        };

        let mut next = self.collections.clone();
        next.push(collection);
        self.collections = next;
        self.persist_collections();
    }

    pub fn delete_collection(&mut self, id: &str) {
        if self.collections.len() <= 1 {
            debug!("delete ignored: the last collection cannot be deleted");
            return;
        }
        if !self.collections.iter().any(|c| c.id == id) {
            debug!(collection = %id, "delete ignored: unknown collection");
            return;
        }

        let next: Vec<Collection> = self
            .collections
            .iter()
            .filter(|c| c.id != id)
            .cloned()
            .collect();
        self.collections = next;

        // Deleting the active collection falls back to the first remaining
        let active_changed = self.active_id == id;
        if active_changed {
            self.active_id = self.collections[0].id.clone();
        }

        self.persist_collections();
        if active_changed {
            self.persist_settings();
        }
    }

    pub fn rename_collection(&mut self, id: &str, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            debug!("rename ignored: empty collection name");
            return;
        }
        let Some(pos) = self.collections.iter().position(|c| c.id == id) else {
            debug!(collection = %id, "rename ignored: unknown collection");
            return;
        };
        if self.collections[pos].name == name {
            return;
        }

        let now = self.clock.now_millis();
        let mut next = self.collections.clone();
        next[pos].rename(name, now);
        self.collections = next;
        self.persist_collections();
    }

    pub fn switch_active_collection(&mut self, id: &str) {
        if self.active_id == id {
            return;
        }
        if !self.collections.iter().any(|c| c.id == id) {
            debug!(collection = %id, "switch ignored: unknown collection");
            return;
        }

        self.active_id = id.to_string();
        if let Some(listener) = self.switch_listener.as_mut() {
            listener();
        }
        self.persist_settings();
    }

    // ==========================================================================
    // Persistence
    // ==========================================================================

    /// Replace the active collection's counters in a freshly computed list
    /// and persist the result
    fn commit_active_counters(&mut self, counters: Vec<Counter>) {
        let now = self.clock.now_millis();
        let mut next = self.collections.clone();
        if let Some(col) = next.iter_mut().find(|c| c.id == self.active_id) {
            col.set_counters(counters, now);
        }
        self.collections = next;
        self.persist_collections();
    }

    fn persist_collections(&mut self) {
        if let Err(error) = self.gateway.save_collections(&self.collections) {
            self.note_save_failure(error);
        }
    }

    fn persist_settings(&mut self) {
        let settings = Settings {
            last_active_collection_id: Some(self.active_id.clone()),
            extra: self.settings_extra.clone(),
        };
        if let Err(error) = self.gateway.save_settings(&settings) {
            self.note_save_failure(error);
        }
    }

    fn note_save_failure(&mut self, error: StorageError) {
        let warning = match error {
            StorageError::Full => SaveWarning::StorageFull,
            other => SaveWarning::Failed(other.to_string()),
        };
        warn!(warning = %warning, "save failed, in-memory state remains authoritative");
        self.save_warning = Some(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{defaults, storage};
    use crate::identity::testing::{SequentialIds, TickingClock};
    use crate::storage::kv::SharedMemoryStore;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn open_store(handle: &SharedMemoryStore) -> TrackerStore {
        TrackerStore::open(
            PersistenceGateway::new(Box::new(handle.clone())),
            Box::new(SequentialIds::default()),
            Box::new(TickingClock::default()),
        )
    }

    fn counter_id(store: &TrackerStore, label: &str) -> String {
        store
            .active_counters()
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.id.clone())
            .unwrap()
    }

    fn collection_id(store: &TrackerStore, name: &str) -> String {
        store
            .collections()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.clone())
            .unwrap()
    }

    #[test]
    fn test_fresh_start_persists_default_collection() {
        let handle = SharedMemoryStore::new();
        let store = open_store(&handle);

        assert_eq!(store.collections().len(), 1);
        assert_eq!(store.active_collection().name, defaults::COLLECTION_NAME);

        // Both entries were written so the next launch finds current data
        let persisted = handle.entry(storage::COLLECTIONS_KEY).unwrap();
        assert!(persisted.contains(defaults::COLLECTION_NAME));
        let settings = handle.entry(storage::SETTINGS_KEY).unwrap();
        assert!(settings.contains(store.active_collection_id()));
    }

    #[test]
    fn test_add_counter_and_persist() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);

        store.add_counter("HP", Some("20"), Some("20"));
        assert_eq!(store.active_counters().len(), 1);
        assert_eq!(store.active_counters()[0].value, 20);

        assert!(handle.entry(storage::COLLECTIONS_KEY).unwrap().contains("HP"));
    }

    #[test]
    fn test_add_counter_whitespace_label_rejected() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);

        store.add_counter("   ", None, None);
        assert!(store.active_counters().is_empty());
    }

    #[test]
    fn test_increment_stops_at_cap() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", Some("2"), Some("0"));
        let id = counter_id(&store, "HP");

        for _ in 0..5 {
            store.update_counter_value(&id, CounterOp::Increment);
        }
        assert_eq!(store.active_counters()[0].value, 2);
    }

    #[test]
    fn test_bounded_noop_does_not_touch_storage() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", Some("1"), Some("1"));
        let id = counter_id(&store, "HP");

        let before_entry = handle.entry(storage::COLLECTIONS_KEY).unwrap();
        let before_modified = store.active_collection().last_modified;

        // Already at the cap: not a state transition
        store.update_counter_value(&id, CounterOp::Increment);

        assert_eq!(handle.entry(storage::COLLECTIONS_KEY).unwrap(), before_entry);
        assert_eq!(store.active_collection().last_modified, before_modified);
    }

    #[test]
    fn test_decrement_stops_at_zero() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("Doom", None, Some("1"));
        let id = counter_id(&store, "Doom");

        store.update_counter_value(&id, CounterOp::Decrement);
        store.update_counter_value(&id, CounterOp::Decrement);
        assert_eq!(store.active_counters()[0].value, 0);
    }

    #[test]
    fn test_reset_restores_initial_even_above_cap() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        // Permissive creation: default above the cap is kept as-is
        store.add_counter("HP", Some("10"), Some("12"));
        let id = counter_id(&store, "HP");

        store.update_counter_value(&id, CounterOp::Decrement);
        store.update_counter_value(&id, CounterOp::Decrement);
        assert_eq!(store.active_counters()[0].value, 10);

        store.update_counter_value(&id, CounterOp::Reset);
        assert_eq!(store.active_counters()[0].value, 12);
    }

    #[test]
    fn test_reset_all() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", None, Some("10"));
        store.add_counter("Mana", None, Some("5"));
        let hp = counter_id(&store, "HP");
        store.update_counter_value(&hp, CounterOp::Decrement);

        store.reset_all();
        assert_eq!(store.active_counters()[0].value, 10);
        assert_eq!(store.active_counters()[1].value, 5);
    }

    #[test]
    fn test_unknown_counter_ids_are_ignored() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", None, None);

        store.update_counter_value("nope", CounterOp::Increment);
        store.remove_counter("nope");
        assert_eq!(store.active_counters().len(), 1);
    }

    #[test]
    fn test_remove_counter() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", None, None);
        store.add_counter("Mana", None, None);
        let hp = counter_id(&store, "HP");

        store.remove_counter(&hp);
        assert_eq!(store.active_counters().len(), 1);
        assert_eq!(store.active_counters()[0].label, "Mana");
    }

    #[test]
    fn test_create_and_switch_collection() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", None, None);

        store.create_collection("Board Games", None);
        assert_eq!(store.collections().len(), 2);
        // Creation does not switch the active collection
        assert_eq!(store.active_collection().name, defaults::COLLECTION_NAME);

        let id = collection_id(&store, "Board Games");
        store.switch_active_collection(&id);
        assert_eq!(store.active_collection().name, "Board Games");
        assert!(store.active_counters().is_empty());
    }

    #[test]
    fn test_create_collection_empty_name_rejected() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.create_collection("  ", None);
        assert_eq!(store.collections().len(), 1);
    }

    #[test]
    fn test_duplicate_collection_is_independent() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", Some("10"), Some("10"));
        let source_id = store.active_collection_id().to_string();

        store.create_collection("Copy", Some(&source_id));
        let copy_id = collection_id(&store, "Copy");

        // Identities are disjoint from the source
        let source_counter_ids: Vec<String> = store
            .collections()
            .iter()
            .find(|c| c.id == source_id)
            .unwrap()
            .counters
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let copy = store.collections().iter().find(|c| c.id == copy_id).unwrap();
        assert_eq!(copy.counters.len(), 1);
        assert!(!source_counter_ids.contains(&copy.counters[0].id));

        // Mutating the copy leaves the source untouched
        store.switch_active_collection(&copy_id);
        let id = counter_id(&store, "HP");
        store.update_counter_value(&id, CounterOp::Decrement);

        let source = store.collections().iter().find(|c| c.id == source_id).unwrap();
        assert_eq!(source.counters[0].value, 10);
        assert_eq!(store.active_counters()[0].value, 9);
    }

    #[test]
    fn test_duplicate_unknown_source_rejected() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.create_collection("Copy", Some("missing"));
        assert_eq!(store.collections().len(), 1);
    }

    #[test]
    fn test_delete_active_collection_falls_back_to_first() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.create_collection("Second", None);
        let second = collection_id(&store, "Second");
        store.switch_active_collection(&second);

        store.delete_collection(&second);

        assert_eq!(store.collections().len(), 1);
        // Exactly one valid active collection referencing an existing entry
        assert_eq!(store.active_collection_id(), store.collections()[0].id);
        let settings = handle.entry(storage::SETTINGS_KEY).unwrap();
        assert!(settings.contains(store.active_collection_id()));
    }

    #[test]
    fn test_delete_inactive_collection_keeps_active() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        let first = store.active_collection_id().to_string();
        store.create_collection("Second", None);
        let second = collection_id(&store, "Second");

        store.delete_collection(&second);
        assert_eq!(store.active_collection_id(), first);
    }

    #[test]
    fn test_delete_last_collection_rejected() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        let only = store.active_collection_id().to_string();

        store.delete_collection(&only);
        assert_eq!(store.collections().len(), 1);
        assert_eq!(store.active_collection_id(), only);
    }

    #[test]
    fn test_rename_collection_bumps_last_modified() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        let id = store.active_collection_id().to_string();
        let before = store.active_collection().last_modified;

        store.rename_collection(&id, "Renamed");
        assert_eq!(store.active_collection().name, "Renamed");
        assert!(store.active_collection().last_modified > before);
    }

    #[test]
    fn test_switch_listener_fires_only_on_real_switches() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.create_collection("Second", None);
        let second = collection_id(&store, "Second");

        let fired = Rc::new(Cell::new(0u32));
        let fired_in_listener = Rc::clone(&fired);
        store.set_switch_listener(Box::new(move || {
            fired_in_listener.set(fired_in_listener.get() + 1);
        }));

        store.switch_active_collection("unknown");
        assert_eq!(fired.get(), 0);

        store.switch_active_collection(&second);
        assert_eq!(fired.get(), 1);

        // Already active: no transition, no signal
        store.switch_active_collection(&second);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_storage_full_warns_but_keeps_memory_state() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);

        handle.set_quota(Some(1));
        store.add_counter("HP", None, Some("3"));

        assert_eq!(store.take_save_warning(), Some(SaveWarning::StorageFull));
        // Drained once
        assert_eq!(store.take_save_warning(), None);
        // The mutation itself stands
        assert_eq!(store.active_counters()[0].value, 3);
    }

    #[test]
    fn test_legacy_migration_erases_key_and_persists_current() {
        let handle = SharedMemoryStore::new();
        handle.seed(
            storage::LEGACY_COUNTERS_KEY,
            &json!([
                {"id": "1", "label": "HP", "value": 5, "initialValue": 10, "maxValue": 10}
            ])
            .to_string(),
        );

        let store = open_store(&handle);

        assert_eq!(store.active_counters().len(), 1);
        assert_eq!(store.active_counters()[0].label, "HP");
        // Legacy entry is gone and current-shape data is in place
        assert!(handle.entry(storage::LEGACY_COUNTERS_KEY).is_none());
        assert!(handle.entry(storage::COLLECTIONS_KEY).unwrap().contains("HP"));

        // A second startup takes the current path and changes nothing
        let again = open_store(&handle);
        assert_eq!(again.collections(), store.collections());
    }

    #[test]
    fn test_presentation_settings_fields_survive_mutations() {
        let handle = SharedMemoryStore::new();
        handle.seed(
            storage::COLLECTIONS_KEY,
            &json!([
                {"id": "col-a", "name": "A", "createdAt": 1, "lastModified": 1, "counters": []},
                {"id": "col-b", "name": "B", "createdAt": 2, "lastModified": 2, "counters": []}
            ])
            .to_string(),
        );
        handle.seed(
            storage::SETTINGS_KEY,
            &json!({"lastActiveCollectionId": "col-a", "theme": "dark"}).to_string(),
        );

        let mut store = open_store(&handle);
        store.switch_active_collection("col-b");

        let settings: serde_json::Value =
            serde_json::from_str(&handle.entry(storage::SETTINGS_KEY).unwrap()).unwrap();
        assert_eq!(settings["lastActiveCollectionId"], "col-b");
        // Fields owned by the UI ride along untouched
        assert_eq!(settings["theme"], "dark");
    }

    #[test]
    fn test_state_survives_reopen() {
        let handle = SharedMemoryStore::new();
        let mut store = open_store(&handle);
        store.add_counter("HP", Some("10"), Some("10"));
        store.create_collection("Second", None);
        let second = collection_id(&store, "Second");
        store.switch_active_collection(&second);

        let reopened = open_store(&handle);
        assert_eq!(reopened.collections(), store.collections());
        assert_eq!(reopened.active_collection_id(), second);
    }
}
