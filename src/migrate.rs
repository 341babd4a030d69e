//! Schema migration
//!
//! Every on-disk generation is upgraded to the current shape through an
//! explicit tagged-variant loader: `Current | Legacy | Empty`, one restore
//! function per variant. Valid counters are never silently lost; anything
//! unusable degrades to a fresh start rather than an unusable application.

use serde_json::Value;
use tracing::{info, warn};

use crate::collection::Collection;
use crate::constants::defaults;
use crate::counter::Counter;
use crate::identity::{Clock, IdSource};
use crate::settings::Settings;
use crate::storage::RawState;

/// Which on-disk generation the raw entries belong to
#[derive(Debug)]
pub enum PersistedFormat {
    /// Current shape: a collections array, with or without settings
    Current {
        collections: Value,
        settings: Option<Value>,
    },
    /// Pre-collections shape: a flat counter array
    Legacy { counters: Value },
    /// Nothing usable persisted yet
    Empty,
}

impl PersistedFormat {
    /// First match wins: current shape, then legacy, then empty. An entry
    /// that is present but not an array counts as a parse failure and falls
    /// through to the fresh start, never to an older format.
    pub fn sniff(raw: RawState) -> Self {
        if let Some(collections) = raw.collections {
            if collections.is_array() {
                return Self::Current {
                    collections,
                    settings: raw.settings,
                };
            }
            warn!("collections entry is not an array, starting fresh");
            return Self::Empty;
        }

        if let Some(counters) = raw.legacy_counters {
            if counters.is_array() {
                return Self::Legacy { counters };
            }
            warn!("legacy counters entry is not an array, starting fresh");
        }

        Self::Empty
    }
}

/// Which restore path produced the state; decides what the store persists
/// right after startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoredFrom {
    /// Data was already current; nothing to write back
    Current,
    /// Legacy data was upgraded; the legacy entry must be erased and the
    /// upgraded state persisted
    Legacy,
    /// A fresh start was created and should be persisted
    Empty,
}

#[derive(Debug)]
pub struct RestoredState {
    pub collections: Vec<Collection>,
    /// Always references an element of `collections`
    pub active_id: String,
    /// Presentation fields recovered from the settings entry
    pub settings_extra: serde_json::Map<String, Value>,
    pub source: RestoredFrom,
}

/// Normalize whatever was last persisted into a valid current-shape state.
/// The result always holds at least one collection and a valid active id.
pub fn restore(raw: RawState, ids: &mut dyn IdSource, clock: &dyn Clock) -> RestoredState {
    match PersistedFormat::sniff(raw) {
        PersistedFormat::Current {
            collections,
            settings,
        } => restore_current(collections, settings, ids, clock),
        PersistedFormat::Legacy { counters } => restore_legacy(counters, ids, clock),
        PersistedFormat::Empty => fresh_start(ids, clock, serde_json::Map::new()),
    }
}

fn restore_current(
    collections: Value,
    settings: Option<Value>,
    ids: &mut dyn IdSource,
    clock: &dyn Clock,
) -> RestoredState {
    let Value::Array(elements) = collections else {
        // sniff() only hands us arrays
        return fresh_start(ids, clock, serde_json::Map::new());
    };

    let total = elements.len();
    let collections: Vec<Collection> = elements
        .into_iter()
        .filter_map(|el| serde_json::from_value(el).ok())
        .collect();
    let dropped = total - collections.len();
    if dropped > 0 {
        warn!(dropped = dropped, "dropped invalid collection entries");
    }

    let settings = settings
        .map(|value| match serde_json::from_value::<Settings>(value) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(error = %error, "unreadable settings entry, using defaults");
                Settings::default()
            }
        })
        .unwrap_or_default();

    if collections.is_empty() {
        return fresh_start(ids, clock, settings.extra);
    }

    // The saved active reference only counts if it still names a collection
    let active_id = settings
        .last_active_collection_id
        .filter(|id| collections.iter().any(|c| &c.id == id))
        .unwrap_or_else(|| collections[0].id.clone());

    RestoredState {
        collections,
        active_id,
        settings_extra: settings.extra,
        source: RestoredFrom::Current,
    }
}

fn restore_legacy(counters: Value, ids: &mut dyn IdSource, clock: &dyn Clock) -> RestoredState {
    let Value::Array(elements) = counters else {
        return fresh_start(ids, clock, serde_json::Map::new());
    };

    let total = elements.len();
    let counters: Vec<Counter> = elements
        .into_iter()
        .filter_map(|el| serde_json::from_value(el).ok())
        .collect();
    let dropped = total - counters.len();
    if dropped > 0 {
        warn!(dropped = dropped, "dropped invalid legacy counters");
    }
    info!(migrated = counters.len(), "migrated legacy counter list");

    let collection = Collection {
        counters,
        ..Collection::new(ids.next_id(), defaults::COLLECTION_NAME, clock.now_millis())
    };
    let active_id = collection.id.clone();

    RestoredState {
        collections: vec![collection],
        active_id,
        settings_extra: serde_json::Map::new(),
        source: RestoredFrom::Legacy,
    }
}

fn fresh_start(
    ids: &mut dyn IdSource,
    clock: &dyn Clock,
    settings_extra: serde_json::Map<String, Value>,
) -> RestoredState {
    let collection = Collection::new(ids.next_id(), defaults::COLLECTION_NAME, clock.now_millis());
    let active_id = collection.id.clone();
    RestoredState {
        collections: vec![collection],
        active_id,
        settings_extra,
        source: RestoredFrom::Empty,
    }
}
