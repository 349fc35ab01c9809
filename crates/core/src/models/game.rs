use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::record_values;

/// A game on the fan favourites list together with its voters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Display name, unique ignoring case.
    pub name: String,
    /// Distinct voter names. The realtime store drops empty arrays, hence the default.
    #[serde(default)]
    pub votes: BTreeSet<String>,
}

impl Game {
    /// A game nobody has voted for yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            votes: BTreeSet::new(),
        }
    }

    /// Case-insensitive name comparison used for uniqueness.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    /// Whether `voter` is already counted.
    pub fn has_vote(&self, voter: &str) -> bool {
        self.votes.contains(voter)
    }

    /// Number of distinct voters.
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GameRecord {
    Current(Game),
    Legacy(String),
}

/// A stored `games` collection, decoded for use and re-encoded on save.
///
/// Every readable entry is upgraded: bare names become games with no votes.
/// Unreadable entries are not addressable, and are written back untouched
/// after the decoded games.
#[derive(Debug, Clone, Default)]
pub struct StoredGames {
    /// Decoded games in list order.
    pub games: Vec<Game>,
    retained: Vec<Value>,
}

impl StoredGames {
    /// Decode a raw collection.
    pub fn decode(raw: &Value) -> Self {
        let mut stored = Self::default();
        for (position, value) in record_values(raw).into_iter().enumerate() {
            match serde_json::from_value::<GameRecord>(value.clone()) {
                Ok(GameRecord::Current(game)) => stored.games.push(game),
                Ok(GameRecord::Legacy(name)) => stored.games.push(Game::new(name)),
                Err(err) => {
                    warn!(position, %err, "Keeping unreadable game record as stored");
                    stored.retained.push(value.clone());
                }
            }
        }
        stored
    }

    /// Encode the whole collection for writing.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let mut records = Vec::with_capacity(self.games.len() + self.retained.len());
        for game in &self.games {
            records.push(serde_json::to_value(game)?);
        }
        records.extend(self.retained.iter().cloned());
        Ok(Value::Array(records))
    }
}

/// Convert a raw `games` collection into vote-tracked games, leaving out
/// unreadable entries.
pub fn normalize_games(raw: &Value) -> Vec<Game> {
    StoredGames::decode(raw).games
}
