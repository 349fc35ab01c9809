//! Fan favourite voting: the game list, votes and the majority rule.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::{PlannerError, PlannerResult, StorageError},
    models::{Game, StoredGames},
    storage::{Collection, Storage},
};

/// Group size used when nothing is configured.
pub const DEFAULT_TOTAL_MEMBERS: u32 = 15;

/// Majority rule: a game is a fan favourite once `ceil(total / 2)` members voted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajorityRule {
    total_members: u32,
}

impl MajorityRule {
    /// Rule for a group of `total_members`; groups smaller than one count as one.
    pub fn new(total_members: u32) -> Self {
        Self {
            total_members: total_members.max(1),
        }
    }

    /// Group size the rule was built for.
    pub fn total_members(&self) -> u32 {
        self.total_members
    }

    /// Minimum number of votes for a fan favourite.
    pub fn threshold(&self) -> usize {
        (self.total_members as usize).div_ceil(2)
    }

    /// Derived vote figures for `game`.
    pub fn tally(&self, game: &Game) -> Tally {
        let vote_count = game.vote_count();
        let threshold = self.threshold();
        Tally {
            vote_count,
            is_fan_favourite: vote_count >= threshold,
            votes_needed: threshold.saturating_sub(vote_count),
        }
    }
}

impl Default for MajorityRule {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_MEMBERS)
    }
}

/// Vote figures of a single game, recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Distinct voters.
    pub vote_count: usize,
    /// Whether the vote count reached the threshold.
    pub is_fan_favourite: bool,
    /// Votes still missing before the game becomes a fan favourite.
    pub votes_needed: usize,
}

impl Tally {
    /// Position in the unvoted / partially voted / fan favourite progression.
    pub fn standing(&self) -> Standing {
        if self.is_fan_favourite {
            Standing::FanFavourite
        } else if self.vote_count == 0 {
            Standing::Unvoted
        } else {
            Standing::PartiallyVoted
        }
    }
}

/// Where a game sits relative to the majority threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standing {
    /// Nobody voted yet.
    Unvoted,
    /// Some votes, below the threshold.
    PartiallyVoted,
    /// At or above the threshold.
    FanFavourite,
}

/// How a vote targets a game: by list position or by (case-insensitive) name.
#[derive(Debug, Clone, Copy)]
pub enum GameKey<'k> {
    /// Zero-based position in the stored list.
    Position(usize),
    /// Game name, compared ignoring case.
    Name(&'k str),
}

impl GameKey<'_> {
    fn locate(&self, games: &[Game]) -> Option<usize> {
        match *self {
            GameKey::Position(index) => (index < games.len()).then_some(index),
            GameKey::Name(name) => games.iter().position(|game| game.is_named(name)),
        }
    }

    fn describe(&self) -> String {
        match self {
            GameKey::Position(index) => format!("game at position {index}"),
            GameKey::Name(name) => format!("game {name:?}"),
        }
    }
}

/// Game list operations against a storage backend.
///
/// Reads upgrade the whole collection from the legacy string shape before any
/// mutation runs; mutations write the full, upgraded collection back.
/// Unreadable entries are written back as they were.
pub struct GameTally<'a> {
    store: &'a dyn Storage,
}

impl<'a> GameTally<'a> {
    /// Tally reading and writing through `store`.
    pub fn new(store: &'a dyn Storage) -> Self {
        Self { store }
    }

    /// Every game in list order, upgraded to the vote-tracked shape.
    pub fn all(&self) -> PlannerResult<Vec<Game>> {
        Ok(self.load()?.games)
    }

    /// Add a game unless one with the same name (ignoring case) exists.
    pub fn add(&self, name: &str) -> PlannerResult<Game> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::Blank("game name"));
        }
        let mut stored = self.load()?;
        if let Some(existing) = stored.games.iter().find(|game| game.is_named(name)) {
            return Err(PlannerError::Duplicate(existing.name.clone()));
        }
        let game = Game::new(name);
        stored.games.push(game.clone());
        self.save(&stored)?;
        info!(name, "Added game");
        Ok(game)
    }

    /// Record `voter`'s vote; fails if they already voted for the game.
    pub fn vote(&self, key: GameKey<'_>, voter: &str) -> PlannerResult<Game> {
        let voter = voter_name(voter)?;
        self.update(key, |game| {
            if !game.votes.insert(voter.to_string()) {
                return Err(PlannerError::AlreadyVoted {
                    game: game.name.clone(),
                    voter: voter.to_string(),
                });
            }
            info!(game = %game.name, voter, votes = game.vote_count(), "Vote recorded");
            Ok(())
        })
    }

    /// Withdraw `voter`'s vote; fails if they had not voted for the game.
    pub fn unvote(&self, key: GameKey<'_>, voter: &str) -> PlannerResult<Game> {
        let voter = voter_name(voter)?;
        self.update(key, |game| {
            if !game.votes.remove(voter) {
                return Err(PlannerError::NotVoted {
                    game: game.name.clone(),
                    voter: voter.to_string(),
                });
            }
            info!(game = %game.name, voter, votes = game.vote_count(), "Vote withdrawn");
            Ok(())
        })
    }

    /// Drop the game at `index`; out-of-range positions are ignored.
    pub fn remove(&self, index: usize) -> PlannerResult<Option<Game>> {
        let mut stored = self.load()?;
        if index >= stored.games.len() {
            debug!(index, "Remove skipped, no game at position");
            return Ok(None);
        }
        let removed = stored.games.remove(index);
        self.save(&stored)?;
        info!(name = %removed.name, "Removed game");
        Ok(Some(removed))
    }

    fn update(
        &self,
        key: GameKey<'_>,
        change: impl FnOnce(&mut Game) -> PlannerResult<()>,
    ) -> PlannerResult<Game> {
        let mut stored = self.load()?;
        let index = key
            .locate(&stored.games)
            .ok_or_else(|| PlannerError::NotFound(key.describe()))?;
        change(&mut stored.games[index])?;
        let updated = stored.games[index].clone();
        self.save(&stored)?;
        Ok(updated)
    }

    fn load(&self) -> PlannerResult<StoredGames> {
        let raw = self.store.read(Collection::Games)?.unwrap_or(Value::Null);
        Ok(StoredGames::decode(&raw))
    }

    fn save(&self, stored: &StoredGames) -> PlannerResult<()> {
        let records = stored.to_value().map_err(StorageError::from)?;
        self.store.write_all(Collection::Games, &records)?;
        Ok(())
    }
}

fn voter_name(voter: &str) -> PlannerResult<&str> {
    let voter = voter.trim();
    if voter.is_empty() {
        return Err(PlannerError::Blank("voter name"));
    }
    Ok(voter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn store_with(games: Value) -> MemoryStore {
        MemoryStore::with_contents(Value::Null, games)
    }

    #[test]
    fn threshold_is_half_the_group_rounded_up() {
        assert_eq!(MajorityRule::default().threshold(), 8);
        assert_eq!(MajorityRule::new(14).threshold(), 7);
        assert_eq!(MajorityRule::new(1).threshold(), 1);
        assert_eq!(MajorityRule::new(0).total_members(), 1);
    }

    #[test]
    fn tally_matches_the_threshold_rule() {
        let rule = MajorityRule::default();
        let mut game = Game::new("Among Us");
        for count in 0..12 {
            let tally = rule.tally(&game);
            assert_eq!(tally.vote_count, count);
            assert_eq!(tally.is_fan_favourite, count >= 8);
            assert_eq!(tally.votes_needed, 8usize.saturating_sub(count));
            game.votes.insert(format!("voter{count}"));
        }
    }

    #[test]
    fn legacy_name_tallies_as_unvoted() -> PlannerResult<()> {
        let store = store_with(json!(["Chess"]));
        let games = GameTally::new(&store).all()?;
        assert_eq!(games, vec![Game::new("Chess")]);

        let tally = MajorityRule::default().tally(&games[0]);
        assert_eq!(
            tally,
            Tally {
                vote_count: 0,
                is_fan_favourite: false,
                votes_needed: 8
            }
        );
        assert_eq!(tally.standing(), Standing::Unvoted);
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected_without_writing() -> PlannerResult<()> {
        let store = store_with(json!([{"name": "Among Us", "votes": ["Ana"]}]));
        let tally = GameTally::new(&store);
        let before = store.read(Collection::Games)?;

        let err = tally.add("among US").unwrap_err();
        assert!(matches!(err, PlannerError::Duplicate(ref name) if name == "Among Us"));
        assert_eq!(store.read(Collection::Games)?, before);

        assert!(matches!(tally.add("   "), Err(PlannerError::Blank(_))));
        assert_eq!(tally.add("  Gartic Phone ")?.name, "Gartic Phone");
        assert_eq!(tally.all()?.len(), 2);
        Ok(())
    }

    #[test]
    fn double_votes_and_missing_votes_fail() -> PlannerResult<()> {
        let store = store_with(json!([{"name": "Among Us", "votes": []}]));
        let tally = GameTally::new(&store);

        tally.vote(GameKey::Position(0), "Tanish")?;
        let err = tally.vote(GameKey::Name("among us"), "Tanish").unwrap_err();
        assert!(matches!(err, PlannerError::AlreadyVoted { .. }));
        assert_eq!(tally.all()?[0].vote_count(), 1);

        let err = tally.unvote(GameKey::Position(0), "Olwethu").unwrap_err();
        assert!(matches!(err, PlannerError::NotVoted { .. }));
        assert_eq!(tally.all()?[0].vote_count(), 1);

        assert_eq!(tally.unvote(GameKey::Position(0), "Tanish")?.vote_count(), 0);
        Ok(())
    }

    #[test]
    fn unknown_games_are_not_found() {
        let store = store_with(json!(["Chess"]));
        let tally = GameTally::new(&store);
        assert!(matches!(
            tally.vote(GameKey::Position(3), "Ana"),
            Err(PlannerError::NotFound(_))
        ));
        assert!(matches!(
            tally.unvote(GameKey::Name("Go"), "Ana"),
            Err(PlannerError::NotFound(_))
        ));
    }

    #[test]
    fn majority_is_reached_and_lost_again() -> PlannerResult<()> {
        let store = store_with(json!([{"name": "Among Us", "votes": []}]));
        let tally = GameTally::new(&store);
        let rule = MajorityRule::default();

        for voter in ["A", "B", "C", "D", "E", "F", "G"] {
            let game = tally.vote(GameKey::Position(0), voter)?;
            assert!(!rule.tally(&game).is_fan_favourite);
        }
        let game = tally.vote(GameKey::Position(0), "H")?;
        assert!(rule.tally(&game).is_fan_favourite);
        assert_eq!(rule.tally(&game).standing(), Standing::FanFavourite);

        let game = tally.unvote(GameKey::Position(0), "C")?;
        assert!(!rule.tally(&game).is_fan_favourite);
        assert_eq!(rule.tally(&game).standing(), Standing::PartiallyVoted);
        Ok(())
    }

    #[test]
    fn voting_upgrades_the_whole_collection() -> PlannerResult<()> {
        let store = store_with(json!(["Chess", "Go", {"name": "Among Us"}]));
        GameTally::new(&store).vote(GameKey::Name("Go"), "Ana")?;

        let raw = store.read(Collection::Games)?.expect("written");
        assert_eq!(
            raw,
            json!([
                {"name": "Chess", "votes": []},
                {"name": "Go", "votes": ["Ana"]},
                {"name": "Among Us", "votes": []}
            ])
        );
        Ok(())
    }

    #[test]
    fn votes_keep_unreadable_entries() -> PlannerResult<()> {
        let store = store_with(json!(["Chess", {"name": "Go", "votes": "Ana"}]));
        let tally = GameTally::new(&store);
        tally.vote(GameKey::Name("chess"), "Bo")?;

        let raw = store.read(Collection::Games)?.expect("written");
        assert_eq!(
            raw,
            json!([{"name": "Chess", "votes": ["Bo"]}, {"name": "Go", "votes": "Ana"}])
        );
        assert!(matches!(
            tally.vote(GameKey::Name("Go"), "Bo"),
            Err(PlannerError::NotFound(_))
        ));
        assert_eq!(tally.remove(1)?, None);
        Ok(())
    }

    #[test]
    fn remove_ignores_out_of_range_positions() -> PlannerResult<()> {
        let store = store_with(json!(["Chess", "Go"]));
        let tally = GameTally::new(&store);
        assert_eq!(tally.remove(5)?, None);
        assert_eq!(store.read(Collection::Games)?, Some(json!(["Chess", "Go"])));

        assert_eq!(tally.remove(0)?, Some(Game::new("Chess")));
        assert_eq!(tally.all()?, vec![Game::new("Go")]);
        Ok(())
    }
}
