//! The planner: owner of the store, entry point for operations and the
//! change feed consumed by the front end.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::info;

use crate::{
    config::{AppConfig, Backend},
    defaults::{default_events, default_games},
    error::{PlannerResult, StorageError},
    models::{normalize_events, normalize_games, record_values, Event},
    schedule::EventScheduler,
    storage::{ChangeStream, Collection, LocalStore, SharedStore, Storage},
    tally::{GameTally, MajorityRule},
    view::{render_events, render_games, EventsView, GamesView},
};

/// Owns the storage backend for the lifetime of the application.
///
/// Dropping the planner releases the backend (and its file watcher, if any)
/// once the last outstanding [`Feed`] is gone.
pub struct Planner {
    store: Arc<dyn Storage>,
    rule: MajorityRule,
}

impl Planner {
    /// Planner over an existing backend.
    pub fn new(store: Arc<dyn Storage>, rule: MajorityRule) -> Self {
        Self { store, rule }
    }

    /// Open the backend selected in `config`.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn Storage> = match config.backend {
            Backend::Local => Arc::new(
                LocalStore::open(&config.data_dir)
                    .with_context(|| format!("failed to open {}", config.data_dir.display()))?,
            ),
            Backend::Shared => {
                let dir = config.store_dir();
                Arc::new(
                    SharedStore::open(dir)
                        .with_context(|| format!("failed to open shared {}", dir.display()))?,
                )
            }
        };
        info!(backend = ?config.backend, dir = %config.store_dir().display(), "Opened store");
        Ok(Self::new(store, config.rule()))
    }

    /// The backing store.
    pub fn store(&self) -> &dyn Storage {
        self.store.as_ref()
    }

    /// Majority rule applied to game tallies.
    pub fn rule(&self) -> MajorityRule {
        self.rule
    }

    /// Event operations.
    pub fn events(&self) -> EventScheduler<'_> {
        EventScheduler::new(self.store.as_ref())
    }

    /// Game and vote operations.
    pub fn games(&self) -> GameTally<'_> {
        GameTally::new(self.store.as_ref())
    }

    /// Write the starter records into every collection that is absent or empty.
    pub fn seed(&self) -> PlannerResult<()> {
        for collection in Collection::ALL {
            let current = self.store.read(collection)?.unwrap_or(Value::Null);
            if !record_values(&current).is_empty() {
                continue;
            }
            let defaults = match collection {
                Collection::Events => serde_json::to_value(default_events()),
                Collection::Games => serde_json::to_value(default_games()),
            }
            .map_err(StorageError::from)?;
            self.store.write_all(collection, &defaults)?;
            info!(%collection, "Seeded empty collection");
        }
        Ok(())
    }

    /// Current events projection.
    pub fn events_view(
        &self,
        now: NaiveDateTime,
        limit: Option<usize>,
    ) -> PlannerResult<EventsView> {
        Ok(render_events(self.events().all()?, now, limit))
    }

    /// Current games projection.
    pub fn games_view(&self) -> PlannerResult<GamesView> {
        Ok(render_games(self.games().all()?, self.rule))
    }

    /// Seed empty collections, then follow both of them.
    ///
    /// The feed first yields the current contents of each collection and
    /// afterwards every change, including changes made by other clients on
    /// a shared backend.
    pub fn subscribe(&self) -> PlannerResult<Feed> {
        self.seed()?;
        Ok(Feed {
            events: Some(self.store.watch(Collection::Events)?),
            games: Some(self.store.watch(Collection::Games)?),
            rule: self.rule,
            _store: Arc::clone(&self.store),
        })
    }
}

/// A re-projected collection snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// All events, normalised but unfiltered; render them against the current time.
    Events(Vec<Event>),
    /// The partitioned game list.
    Games(GamesView),
}

/// Lazy, non-restartable stream of [`Update`]s. Drop it to unsubscribe.
pub struct Feed {
    events: Option<ChangeStream>,
    games: Option<ChangeStream>,
    rule: MajorityRule,
    _store: Arc<dyn Storage>,
}

impl Feed {
    /// Wait for the next update; `None` once both collections stopped.
    pub async fn next(&mut self) -> Option<Update> {
        loop {
            let (events_open, games_open) = (self.events.is_some(), self.games.is_some());
            tokio::select! {
                raw = next_snapshot(&mut self.events), if events_open => match raw {
                    Some(raw) => return Some(Update::Events(normalize_events(&raw))),
                    None => self.events = None,
                },
                raw = next_snapshot(&mut self.games), if games_open => match raw {
                    Some(raw) => {
                        return Some(Update::Games(render_games(normalize_games(&raw), self.rule)))
                    }
                    None => self.games = None,
                },
                else => return None,
            }
        }
    }
}

async fn next_snapshot(stream: &mut Option<ChangeStream>) -> Option<Value> {
    match stream {
        Some(stream) => stream.next().await,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::EventDraft, storage::MemoryStore, tally::GameKey};
    use anyhow::Result;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn planner_with(store: MemoryStore) -> Planner {
        Planner::new(Arc::new(store), MajorityRule::default())
    }

    async fn next_update(feed: &mut Feed) -> Result<Update> {
        timeout(Duration::from_secs(2), feed.next())
            .await?
            .context("feed closed")
    }

    #[test]
    fn seeds_only_empty_collections() -> Result<()> {
        let planner = planner_with(MemoryStore::with_contents(json!([]), json!(["Chess"])));
        planner.seed()?;

        assert_eq!(planner.events().all()?.len(), 2);
        assert_eq!(planner.games().all()?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn feed_starts_with_seeded_contents() -> Result<()> {
        let planner = planner_with(MemoryStore::new());
        let mut feed = planner.subscribe()?;

        let mut saw_events = false;
        let mut saw_games = false;
        for _ in 0..2 {
            match next_update(&mut feed).await? {
                Update::Events(events) => {
                    saw_events = true;
                    assert_eq!(events.len(), 2);
                }
                Update::Games(view) => {
                    saw_games = true;
                    assert_eq!(view.in_consideration.len(), 3);
                    assert!(view.fan_favourites.is_empty());
                }
            }
        }
        assert!(saw_events && saw_games);
        Ok(())
    }

    #[tokio::test]
    async fn feed_reprojects_after_every_write() -> Result<()> {
        let planner = planner_with(MemoryStore::with_contents(
            json!([]),
            json!([{"name": "Among Us", "votes": []}]),
        ));
        let mut feed = planner.subscribe()?;
        next_update(&mut feed).await?;
        next_update(&mut feed).await?;

        for voter in ["A", "B", "C", "D", "E", "F", "G", "H"] {
            planner.games().vote(GameKey::Position(0), voter)?;
        }
        match next_update(&mut feed).await? {
            Update::Games(view) => assert_eq!(view.fan_favourites.len(), 1),
            other => panic!("unexpected update {other:?}"),
        }

        let draft = EventDraft::parse("Picnic", "2030-06-01", "", "Park", "Food", "Ana")?;
        let added = planner.events().add(draft)?;
        match next_update(&mut feed).await? {
            Update::Events(events) => assert!(events.iter().any(|event| event.id == added.id)),
            other => panic!("unexpected update {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn clients_on_one_store_see_each_other() -> Result<()> {
        let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());
        let alice = Planner::new(Arc::clone(&store), MajorityRule::default());
        let bob = Planner::new(store, MajorityRule::default());

        let mut feed = alice.subscribe()?;
        next_update(&mut feed).await?;
        next_update(&mut feed).await?;

        bob.games().add("Chess")?;
        match next_update(&mut feed).await? {
            Update::Games(view) => {
                assert!(view.in_consideration.iter().any(|card| card.name == "Chess"))
            }
            other => panic!("unexpected update {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn views_use_the_configured_rule() -> Result<()> {
        let store = MemoryStore::with_contents(
            Value::Null,
            json!([{"name": "Chess", "votes": ["A", "B"]}]),
        );
        let planner = Planner::new(Arc::new(store), MajorityRule::new(4));
        assert_eq!(planner.games_view()?.fan_favourites.len(), 1);

        let now = NaiveDateTime::parse_from_str("2020-01-01 00:00", "%Y-%m-%d %H:%M")?;
        planner.seed()?;
        assert_eq!(planner.events_view(now, Some(1))?.cards.len(), 1);
        Ok(())
    }
}
