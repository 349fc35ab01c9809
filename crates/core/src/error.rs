//! Error types surfaced by the storage adapters and the planner operations.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a collection file failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A collection file did not contain valid JSON.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// Records could not be serialised for writing.
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
    /// The file watcher behind a shared store could not be started.
    #[error("failed to watch shared directory: {0}")]
    Watch(#[from] notify::Error),
    /// The atomic rename of a freshly written collection failed.
    #[error("failed to replace collection file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// User-facing failures of event and game operations.
///
/// Every variant except [`PlannerError::Storage`] is local to the single
/// operation that raised it and leaves the stored collection untouched.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A game with the same name (ignoring case) already exists.
    #[error("\"{0}\" is already on the list")]
    Duplicate(String),
    /// The voter already appears in the game's vote set.
    #[error("{voter} has already voted for {game}")]
    AlreadyVoted {
        /// Game that was targeted.
        game: String,
        /// Voter that attempted the second vote.
        voter: String,
    },
    /// The voter does not appear in the game's vote set.
    #[error("{voter} has not voted for {game}")]
    NotVoted {
        /// Game that was targeted.
        game: String,
        /// Voter whose vote was to be withdrawn.
        voter: String,
    },
    /// No record matched the given id, position or name.
    #[error("{0} not found")]
    NotFound(String),
    /// A required name was empty after trimming.
    #[error("{0} cannot be blank")]
    Blank(&'static str),
    /// A draft field could not be parsed.
    #[error("invalid {field}: {value:?}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw value supplied.
        value: String,
    },
    /// The storage backend rejected the read or write.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result alias for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;
