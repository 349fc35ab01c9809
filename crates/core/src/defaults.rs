//! Records written to an empty store on first subscription.

use serde_json::{json, Value};

use crate::models::{normalize_events, normalize_games, Event, Game};

fn raw_events() -> Value {
    json!([
        {
            "id": 1,
            "title": "MARTY SUPREMEEEE",
            "date": "2026-01-31",
            "time": "14:00",
            "location": "Ambience",
            "activity": "Marty Supreme Movie",
            "people": "Nimeesha, Tanish, Olwethu"
        },
        {
            "id": 2,
            "title": "Game Night",
            "date": "2026-01-31",
            "time": "19:00",
            "location": "Discord + Whatsapp for Yuppaya",
            "activity": "Fan Favourites including Among Us, Gartic Phone, Roblox Horror Games",
            "people": "Hopefully Everyone"
        }
    ])
}

/// Starter events.
pub fn default_events() -> Vec<Event> {
    normalize_events(&raw_events())
}

/// Starter games, nobody has voted yet.
pub fn default_games() -> Vec<Game> {
    normalize_games(&json!(["Among Us", "Gartic Phone", "Roblox Horror Games"]))
}
