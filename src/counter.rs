//! Counter entity: a bounded integer tracker with identity and reset semantics
//!
//! All value mutations are pure functions returning a new counter; bounds are
//! enforced at the mutation boundary, never corrected after the fact.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::defaults;
use crate::identity::IdSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    /// Opaque unique identifier, immutable after creation
    pub id: String,
    pub label: String,
    /// Current value; `0 <= value`, and `value <= max_value` when a cap is set
    pub value: i64,
    /// Snapshot used by reset, set at creation
    pub initial_value: i64,
    /// Optional upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
}

impl Counter {
    /// Build a counter from raw form input.
    ///
    /// The label is trimmed and must be non-empty; an empty label is a
    /// rejected construction (`None`), not an error state. An unparseable or
    /// non-positive `max_input` is treated as "no cap"; an unparseable
    /// `default_input` falls back to 0. The chosen default is NOT clamped to
    /// the cap: an out-of-range starting value is accepted as-is.
    pub fn from_input(
        ids: &mut dyn IdSource,
        label: &str,
        max_input: Option<&str>,
        default_input: Option<&str>,
    ) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() {
            debug!("rejected counter construction: empty label");
            return None;
        }

        let max_value = max_input.and_then(parse_positive);
        let value = default_input
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(defaults::COUNTER_VALUE);

        Some(Self {
            id: ids.next_id(),
            label: label.to_string(),
            value,
            initial_value: value,
            max_value,
        })
    }

    /// Value + 1, unless already at or above the cap
    pub fn incremented(&self) -> Self {
        match self.max_value {
            Some(max) if self.value >= max => self.clone(),
            _ => Self {
                value: self.value + 1,
                ..self.clone()
            },
        }
    }

    /// Value - 1, unless already at 0
    pub fn decremented(&self) -> Self {
        if self.value > 0 {
            Self {
                value: self.value - 1,
                ..self.clone()
            }
        } else {
            self.clone()
        }
    }

    /// Back to the creation-time starting value
    pub fn reset(&self) -> Self {
        Self {
            value: self.initial_value,
            ..self.clone()
        }
    }
}

/// One of the three value mutations, applied by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOp {
    Increment,
    Decrement,
    Reset,
}

impl CounterOp {
    pub fn apply(self, counter: &Counter) -> Counter {
        match self {
            CounterOp::Increment => counter.incremented(),
            CounterOp::Decrement => counter.decremented(),
            CounterOp::Reset => counter.reset(),
        }
    }
}

fn parse_positive(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok().filter(|n| *n > 0)
}
