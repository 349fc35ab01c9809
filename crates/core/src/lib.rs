#![warn(clippy::all, missing_docs)]

//! Core domain logic for the hangout planner.
//!
//! This crate hosts the event and game models, the storage adapters that
//! persist them, the scheduling and voting operations, and the render
//! models consumed by the terminal UI and any future frontends.

pub mod config;
pub mod defaults;
pub mod error;
pub mod models;
pub mod planner;
pub mod schedule;
pub mod storage;
pub mod tally;
pub mod view;

pub use config::AppConfig;
pub use error::{PlannerError, PlannerResult, StorageError, StorageResult};
pub use models::{Event, EventDraft, EventId, Game, StoredEvents, StoredGames};
pub use planner::{Feed, Planner, Update};
pub use schedule::EventScheduler;
pub use storage::{Collection, Storage};
pub use tally::{GameKey, GameTally, MajorityRule, Standing, Tally};
pub use view::{EventCard, EventsView, GameCard, GamesView};
