//! Application-wide constants
//!
//! Storage entry names and default values used throughout the application,
//! providing a single source of truth.

/// Persisted entry names (local key-value store)
pub mod storage {
    /// Directory under the platform data dir that holds the store entries
    pub const APP_DIR: &str = "tallydeck";

    /// Current-format entry: the full collection list
    pub const COLLECTIONS_KEY: &str = "collections";

    /// Settings entry: active-collection reference plus presentation fields
    pub const SETTINGS_KEY: &str = "settings";

    /// Pre-collections entry: flat counter array, erased after migration
    pub const LEGACY_COUNTERS_KEY: &str = "counters";
}

/// Default values for created state
pub mod defaults {
    /// Name of the collection created on first launch or by legacy migration
    pub const COLLECTION_NAME: &str = "My Counters";

    /// Counter starting value when the creation input doesn't parse
    pub const COUNTER_VALUE: i64 = 0;
}
