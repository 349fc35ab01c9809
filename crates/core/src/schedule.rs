//! Event scheduling: add, edit, delete and the upcoming listing.

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::{PlannerResult, StorageError},
    models::{sort_chronologically, Event, EventDraft, EventId, StoredEvents},
    storage::{Collection, Storage},
};

/// Keep events starting at or after `now`, earliest first, optionally truncated.
pub fn upcoming(mut events: Vec<Event>, now: NaiveDateTime, limit: Option<usize>) -> Vec<Event> {
    events.retain(|event| event.starts_at() >= now);
    sort_chronologically(&mut events);
    if let Some(limit) = limit {
        events.truncate(limit);
    }
    events
}

/// Event operations against a storage backend.
///
/// Nothing is cached: every call reads the collection, and every mutation
/// writes the whole collection back before returning. Stored entries that
/// cannot be decoded are written back as they were.
pub struct EventScheduler<'a> {
    store: &'a dyn Storage,
}

impl<'a> EventScheduler<'a> {
    /// Scheduler reading and writing through `store`.
    pub fn new(store: &'a dyn Storage) -> Self {
        Self { store }
    }

    /// Every stored event in collection order.
    pub fn all(&self) -> PlannerResult<Vec<Event>> {
        Ok(self.load()?.events)
    }

    /// Look up a single event.
    pub fn get(&self, id: EventId) -> PlannerResult<Option<Event>> {
        Ok(self.all()?.into_iter().find(|event| event.id == id))
    }

    /// Snapshot of events at or after `now`, sorted by start.
    pub fn list_upcoming(
        &self,
        now: NaiveDateTime,
        limit: Option<usize>,
    ) -> PlannerResult<Vec<Event>> {
        let events = upcoming(self.all()?, now, limit);
        debug!(count = events.len(), "Listed upcoming events");
        Ok(events)
    }

    /// Append a new event with id `max(existing) + 1`.
    pub fn add(&self, draft: EventDraft) -> PlannerResult<Event> {
        let mut stored = self.load()?;
        let id = stored.next_id();
        let event = Event::from_draft(id, draft);
        stored.events.push(event.clone());
        self.save(&stored)?;
        info!(%id, title = %event.title, "Added event");
        Ok(event)
    }

    /// Replace all fields of the event with `id`.
    ///
    /// Returns `None` and writes nothing when no such event exists.
    pub fn edit(&self, id: EventId, draft: EventDraft) -> PlannerResult<Option<Event>> {
        let mut stored = self.load()?;
        let Some(event) = stored.events.iter_mut().find(|event| event.id == id) else {
            debug!(%id, "Edit skipped, no such event");
            return Ok(None);
        };
        event.apply(draft);
        let updated = event.clone();
        self.save(&stored)?;
        info!(%id, title = %updated.title, "Edited event");
        Ok(Some(updated))
    }

    /// Remove the event with `id`; returns whether anything was removed.
    pub fn delete(&self, id: EventId) -> PlannerResult<bool> {
        let mut stored = self.load()?;
        let before = stored.events.len();
        stored.events.retain(|event| event.id != id);
        if stored.events.len() == before {
            debug!(%id, "Delete skipped, no such event");
            return Ok(false);
        }
        self.save(&stored)?;
        info!(%id, "Deleted event");
        Ok(true)
    }

    fn load(&self) -> PlannerResult<StoredEvents> {
        let raw = self.store.read(Collection::Events)?.unwrap_or(Value::Null);
        Ok(StoredEvents::decode(&raw))
    }

    fn save(&self, stored: &StoredEvents) -> PlannerResult<()> {
        let records = stored.to_value().map_err(StorageError::from)?;
        self.store.write_all(Collection::Events, &records)?;
        Ok(())
    }
}
