use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{Broadcast, ChangeStream, Collection, Storage};
use crate::error::{StorageError, StorageResult};

/// Directory under the platform data dir used when nothing is configured.
pub const DEFAULT_DATA_DIR: &str = "hangout";

/// Synchronous store keeping one JSON file per collection.
///
/// Subscribers only hear about writes made through this instance; see
/// [`super::SharedStore`] for changes made by other processes.
pub struct LocalStore {
    root: PathBuf,
    broadcast: Broadcast,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;

        let events = read_file(&collection_path(&root, Collection::Events))?;
        let games = read_file(&collection_path(&root, Collection::Games))?;
        debug!(root = %root.display(), "Opened local store");
        Ok(Self {
            broadcast: Broadcast::new(
                events.unwrap_or(Value::Null),
                games.unwrap_or(Value::Null),
            ),
            root,
        })
    }

    /// Default location under the user's data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DATA_DIR)
    }

    /// Directory holding the collection files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `collection`.
    pub fn path_for(&self, collection: Collection) -> PathBuf {
        collection_path(&self.root, collection)
    }

    /// Re-read `collection` from disk and notify subscribers if it changed.
    pub(crate) fn refresh(&self, collection: Collection) -> StorageResult<bool> {
        let records = read_file(&self.path_for(collection))?.unwrap_or(Value::Null);
        Ok(self.broadcast.publish(collection, records))
    }

    fn write_file(&self, path: &Path, records: &Value) -> StorageResult<()> {
        let serialised = serde_json::to_vec_pretty(records)?;
        let io_error = |source: io::Error| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = NamedTempFile::new_in(&self.root).map_err(io_error)?;
        file.write_all(&serialised).map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(path)?;
        Ok(())
    }
}

impl Storage for LocalStore {
    fn read(&self, collection: Collection) -> StorageResult<Option<Value>> {
        read_file(&self.path_for(collection))
    }

    fn write_all(&self, collection: Collection, records: &Value) -> StorageResult<()> {
        let path = self.path_for(collection);
        self.write_file(&path, records)?;
        debug!(%collection, path = %path.display(), "Wrote collection");
        self.broadcast.publish(collection, records.clone());
        Ok(())
    }

    fn watch(&self, collection: Collection) -> StorageResult<ChangeStream> {
        Ok(self.broadcast.subscribe(collection))
    }
}

fn collection_path(root: &Path, collection: Collection) -> PathBuf {
    root.join(format!("{}.json", collection.name()))
}

fn read_file(path: &Path) -> StorageResult<Option<Value>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&content).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}
