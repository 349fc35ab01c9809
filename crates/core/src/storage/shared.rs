use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ChangeStream, Collection, LocalStore, Storage};
use crate::error::StorageResult;

/// Store over a directory that several clients write to.
///
/// Reads and writes behave like [`LocalStore`]; in addition a file watcher
/// pushes every change to the collection files, whoever made it, to the
/// subscribers. Concurrent writers race: the last complete write wins.
pub struct SharedStore {
    inner: Arc<LocalStore>,
    watcher: Mutex<RecommendedWatcher>,
}

impl SharedStore {
    /// Open the shared directory and start watching it.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let inner = Arc::new(LocalStore::open(root)?);
        let handler_store = Arc::clone(&inner);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => apply_event(&handler_store, &event),
                Err(err) => warn!(%err, "Shared store watcher error"),
            })?;
        watcher.watch(inner.root(), RecursiveMode::NonRecursive)?;
        info!(root = %inner.root().display(), "Watching shared store");

        Ok(Self {
            inner,
            watcher: Mutex::new(watcher),
        })
    }

    /// Directory being watched.
    pub fn root(&self) -> &Path {
        self.inner.root()
    }
}

impl Drop for SharedStore {
    fn drop(&mut self) {
        if let Err(err) = self.watcher.get_mut().unwatch(self.inner.root()) {
            debug!(%err, "Failed to stop watching shared store");
        }
    }
}

impl Storage for SharedStore {
    fn read(&self, collection: Collection) -> StorageResult<Option<Value>> {
        self.inner.read(collection)
    }

    fn write_all(&self, collection: Collection, records: &Value) -> StorageResult<()> {
        self.inner.write_all(collection, records)
    }

    fn watch(&self, collection: Collection) -> StorageResult<ChangeStream> {
        self.inner.watch(collection)
    }
}

fn apply_event(store: &LocalStore, event: &Event) {
    if event.kind.is_access() {
        return;
    }
    for collection in event.paths.iter().filter_map(|path| collection_for(path)) {
        match store.refresh(collection) {
            Ok(true) => debug!(%collection, "Picked up external change"),
            Ok(false) => {}
            // Usually a half-written file from a non-atomic writer; the next event retries.
            Err(err) => warn!(%collection, %err, "Failed to reload shared collection"),
        }
    }
}

fn collection_for(path: &Path) -> Option<Collection> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    Collection::from_name(path.file_stem()?.to_str()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::timeout;

    #[test]
    fn maps_only_collection_files() {
        assert_eq!(
            collection_for(Path::new("/tmp/x/events.json")),
            Some(Collection::Events)
        );
        assert_eq!(
            collection_for(Path::new("games.json")),
            Some(Collection::Games)
        );
        assert_eq!(collection_for(Path::new("/tmp/x/.tmpA1b2C3")), None);
        assert_eq!(collection_for(Path::new("/tmp/x/notes.json")), None);
    }

    #[tokio::test]
    async fn pushes_changes_written_by_another_client() -> Result<()> {
        let dir = tempdir()?;
        let reader = SharedStore::open(dir.path())?;
        let writer = SharedStore::open(dir.path())?;

        let mut stream = reader.watch(Collection::Games)?;
        assert_eq!(stream.next().await, Some(Value::Null));

        writer.write_all(Collection::Games, &json!([{"name": "Chess", "votes": ["Ana"]}]))?;

        let pushed = timeout(Duration::from_secs(5), stream.next()).await?;
        assert_eq!(pushed, Some(json!([{"name": "Chess", "votes": ["Ana"]}])));
        assert_eq!(reader.read(Collection::Games)?, pushed);
        Ok(())
    }
}
