//! Shared domain models and the read-time normalisation of stored records.

mod event;
mod game;

pub use event::{
    normalize_events, sort_chronologically, Event, EventDraft, EventId, StoredEvents,
};
pub use game::{normalize_games, Game, StoredGames};

use serde_json::Value;

/// Flatten a raw collection into its records.
///
/// The realtime store hands collections back either as arrays (possibly with
/// `null` holes left by deletions) or as objects keyed by push id.
pub(crate) fn record_values(raw: &Value) -> Vec<&Value> {
    match raw {
        Value::Array(items) => items.iter().filter(|item| !item.is_null()).collect(),
        Value::Object(map) => map.values().filter(|item| !item.is_null()).collect(),
        _ => Vec::new(),
    }
}
