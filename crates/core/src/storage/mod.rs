//! Storage adapters that own the `events` and `games` collections.
//!
//! Collections are always read and written whole. Backends hand back the raw
//! JSON they hold; normalisation into typed records happens in [`crate::models`].

/// Shared-directory backend pushing changes made by other clients.
pub mod shared;
/// File-backed backend for a single client.
pub mod local;
/// In-process backend.
pub mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use shared::SharedStore;

use std::fmt;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::StorageResult;

/// The two persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Scheduled events.
    Events,
    /// Fan favourite games and their votes.
    Games,
}

impl Collection {
    /// Every collection, in a fixed order.
    pub const ALL: [Collection; 2] = [Collection::Events, Collection::Games];

    /// Storage key of the collection.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::Games => "games",
        }
    }

    /// Inverse of [`Collection::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|collection| collection.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Load/save primitives the planner consumes.
///
/// `read` returns `None` when the collection has never been written.
pub trait Storage: Send + Sync {
    /// Current raw contents of `collection`.
    fn read(&self, collection: Collection) -> StorageResult<Option<Value>>;

    /// Replace the entire collection.
    fn write_all(&self, collection: Collection, records: &Value) -> StorageResult<()>;

    /// Subscribe to full-collection snapshots.
    fn watch(&self, collection: Collection) -> StorageResult<ChangeStream>;
}

/// Stream of collection snapshots for a single subscriber.
///
/// The first [`ChangeStream::next`] yields the contents at subscription time;
/// later calls wait for the next change. Intermediate snapshots may be
/// coalesced. Dropping the stream unsubscribes.
pub struct ChangeStream {
    collection: Collection,
    receiver: watch::Receiver<Value>,
    primed: bool,
}

impl ChangeStream {
    pub(crate) fn new(collection: Collection, receiver: watch::Receiver<Value>) -> Self {
        Self {
            collection,
            receiver,
            primed: false,
        }
    }

    /// Collection this stream follows.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Wait for the next snapshot. `None` once the backend has shut down.
    pub async fn next(&mut self) -> Option<Value> {
        if self.primed {
            self.receiver.changed().await.ok()?;
        }
        self.primed = true;
        let snapshot = self.receiver.borrow_and_update().clone();
        Some(snapshot)
    }
}

/// Per-collection notification channels shared by every backend.
pub(crate) struct Broadcast {
    events: watch::Sender<Value>,
    games: watch::Sender<Value>,
}

impl Broadcast {
    pub(crate) fn new(events: Value, games: Value) -> Self {
        Self {
            events: watch::Sender::new(events),
            games: watch::Sender::new(games),
        }
    }

    fn sender(&self, collection: Collection) -> &watch::Sender<Value> {
        match collection {
            Collection::Events => &self.events,
            Collection::Games => &self.games,
        }
    }

    /// Latest published snapshot, `Null` when never written.
    pub(crate) fn current(&self, collection: Collection) -> Value {
        self.sender(collection).borrow().clone()
    }

    /// Publish a snapshot; returns whether it differed from the previous one.
    pub(crate) fn publish(&self, collection: Collection, records: Value) -> bool {
        self.sender(collection).send_if_modified(|current| {
            if *current == records {
                false
            } else {
                *current = records;
                true
            }
        })
    }

    pub(crate) fn subscribe(&self, collection: Collection) -> ChangeStream {
        ChangeStream::new(collection, self.sender(collection).subscribe())
    }
}
