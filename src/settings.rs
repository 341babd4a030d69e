//! Settings entry: the active-collection reference plus presentation fields
//!
//! Presentation-only fields (theme, display-mode flags) are not core data,
//! but they persist alongside settings; they are captured in a passthrough
//! map so a load → save round-trip never drops them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Reference (not ownership) to a collection; revalidated on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_collection_id: Option<String>,

    /// Whatever else the UI persisted here, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "lastActiveCollectionId": "col-1",
            "theme": "dark",
            "fullscreen": true,
        });

        let settings: Settings = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(settings.last_active_collection_id.as_deref(), Some("col-1"));

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_missing_fields_tolerated() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.last_active_collection_id, None);
        assert!(settings.extra.is_empty());
    }
}
