//! showrunner - Personal viewing schedule generator
//!
//! Builds dated viewing schedules out of a user's shows and movies, rotating
//! between shows, honouring episode filters and filling gaps with reruns.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`scheduler`] - Slot calculation, filters, rotation and the generation engine
//! - [`storage`] - Collaborator traits, SQLite and in-memory repositories
//! - [`metrics`] - Prometheus counters for generation runs
//! - [`error`] - Unified error type
//! - [`utils`] - Bounded concurrency and small helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use showrunner::config::Config;
//! use showrunner::scheduler::{GenerationRequest, ScheduleEngine, SlotSpec};
//! use showrunner::storage::SqliteRepository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repo = Arc::new(SqliteRepository::new(&config.database.sqlite_path)?);
//!     let engine = ScheduleEngine::from_repository(repo, config.engine.clone());
//!
//!     let request = GenerationRequest::for_dates("2024-01-01", "2024-01-07", SlotSpec::labels(["20:00"]))?;
//!     let outcome = engine.generate_and_commit("user-1", &request).await?;
//!     println!("{}", outcome.summary.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, ShowrunnerErrorTrait};
    pub use crate::models::{ContentKind, ContentRef, DraftAssignment, Episode, EpisodeKey, ScheduleItem, WatchRecord};
    pub use crate::scheduler::{
        ContentSelection, EpisodeFilterRule, GenerationOutcome, GenerationRequest, RerunFrequency, RotationStrategy,
        ScheduleEngine, SlotSpec,
    };
    pub use crate::storage::{MemoryRepository, SqliteRepository};
}

// Direct re-exports for convenience
pub use models::{ContentKind, ContentRef, Episode, EpisodeKey, ScheduleItem};
