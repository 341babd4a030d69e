//! Collection entity: a named, ordered group of counters with timestamps

use serde::{Deserialize, Serialize};

use crate::counter::Counter;
use crate::identity::IdSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Opaque unique identifier, immutable
    pub id: String,
    pub name: String,
    /// Creation instant (epoch millis), immutable
    pub created_at: i64,
    /// Bumped on every counter-list mutation or rename
    pub last_modified: i64,
    /// Insertion order is display order
    #[serde(default)]
    pub counters: Vec<Counter>,
}

impl Collection {
    /// Create an empty collection
    pub fn new(id: String, name: &str, now: i64) -> Self {
        Self {
            id,
            name: name.trim().to_string(),
            created_at: now,
            last_modified: now,
            counters: Vec::new(),
        }
    }

    /// Create a collection whose counters are deep copies of `source`'s,
    /// each with a fresh identity, so mutating the duplicate never affects
    /// the source.
    pub fn duplicate_from(
        source: &Collection,
        id: String,
        name: &str,
        now: i64,
        ids: &mut dyn IdSource,
    ) -> Self {
        let counters = source
            .counters
            .iter()
            .map(|c| Counter {
                id: ids.next_id(),
                ..c.clone()
            })
            .collect();
        Self {
            counters,
            ..Self::new(id, name, now)
        }
    }

    pub fn rename(&mut self, name: &str, now: i64) {
        self.name = name.trim().to_string();
        self.last_modified = now;
    }

    /// Replace the counter list wholesale. Every counter-level mutation
    /// funnels through here so `last_modified` is never missed.
    pub fn set_counters(&mut self, counters: Vec<Counter>, now: i64) {
        self.counters = counters;
        self.last_modified = now;
    }
}
