use serde_json::Value;

use super::{Broadcast, ChangeStream, Collection, Storage};
use crate::error::StorageResult;

/// Store that keeps collections in memory only.
///
/// Cloning is not supported; share it behind an `Arc` to simulate several
/// clients on one backend.
pub struct MemoryStore {
    broadcast: Broadcast,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            broadcast: Broadcast::new(Value::Null, Value::Null),
        }
    }

    /// Store pre-populated with raw collections, e.g. legacy fixtures.
    pub fn with_contents(events: Value, games: Value) -> Self {
        Self {
            broadcast: Broadcast::new(events, games),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn read(&self, collection: Collection) -> StorageResult<Option<Value>> {
        Ok(match self.broadcast.current(collection) {
            Value::Null => None,
            value => Some(value),
        })
    }

    fn write_all(&self, collection: Collection, records: &Value) -> StorageResult<()> {
        self.broadcast.publish(collection, records.clone());
        Ok(())
    }

    fn watch(&self, collection: Collection) -> StorageResult<ChangeStream> {
        Ok(self.broadcast.subscribe(collection))
    }
}
