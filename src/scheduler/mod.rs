//! Schedule generation
//!
//! Turns a user's selected shows and movies, a calendar window, a set of daily
//! time-of-day slots, a rotation/rerun policy and per-show episode filters into a
//! conflict-free, dated sequence of viewing assignments.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        ScheduleEngine                         │
//! │                                                               │
//! │  GenerationRequest ──► prefetch (bounded) ──► slot grid       │
//! │                                                  │            │
//! │                    episode filters ◄─────────────┘            │
//! │                          │                                    │
//! │                   ┌──────▼──────┐                             │
//! │                   │  allocator  │  rotation strategy,         │
//! │                   │   (pure)    │  rerun policy, cursors      │
//! │                   └──────┬──────┘                             │
//! └──────────────────────────┼────────────────────────────────────┘
//!                            ▼
//!                     ScheduleWriter ──► ScheduleStore
//! ```
//!
//! # Modules
//!
//! - [`time`] - Slot label generation, offset parsing, date ranges
//! - [`filter`] - Per-show include/exclude episode filters
//! - [`duration`] - Slot duration estimation from known runtimes
//! - [`rotation`] - Rotation strategies, rerun policy, rotation cursors
//! - [`schedule`] - Slot grid and generation results
//! - [`allocator`] - The slot-by-slot allocation walk
//! - [`request`] - Generation requests and per-user defaults
//! - [`engine`] - Orchestration over the storage collaborators
//!
//! # Quick Start
//!
//! ```ignore
//! use showrunner::scheduler::{ContentSelection, GenerationRequest, ScheduleEngine, SlotSpec};
//!
//! let engine = ScheduleEngine::from_repository(repo, config.engine.clone());
//!
//! let request = GenerationRequest::for_dates("2024-01-01", "2024-01-07", SlotSpec::window("19:00", "23:00", None))?
//!     .with_selection(ContentSelection::explicit(["the-office", "heat"]))
//!     .with_timezone_offset("-05:00");
//!
//! let outcome = engine.generate_and_commit("user-1", &request).await?;
//! println!("{}", outcome.summary.display());
//! ```
//!
//! # Rerun Tiers
//!
//! | Frequency | Max reruns / day | Cooldown |
//! |-----------|------------------|----------|
//! | `low`     | 1                | 7 days   |
//! | `medium`  | 3                | 3 days   |
//! | `high`    | unlimited        | 1 day    |

pub mod allocator;
pub mod duration;
pub mod engine;
pub mod error;
pub mod filter;
pub mod request;
pub mod rotation;
pub mod schedule;
pub mod time;

// Re-export main types
pub use allocator::{allocate, AllocationInput, AllocationOutput, AllocationPolicy, ShowPlan};
pub use duration::{estimate_slot_duration, estimate_slot_duration_or, DEFAULT_SLOT_DURATION_MINUTES};
pub use engine::ScheduleEngine;
pub use error::{SchedulerError, SchedulerResult};
pub use filter::{apply_episode_filters, EpisodeFilterRule, FilterMode, FilterRules};
pub use request::{ContentSelection, GenerationRequest, SlotSpec, UserPreferences};
pub use rotation::{
    shuffle_array, CursorMap, RerunFrequency, RerunPolicy, RotationCursor, RotationState, RotationStrategy,
};
pub use schedule::{build_slot_grid, GenerationOutcome, GenerationStatus, GenerationSummary, TimeSlot};
pub use time::{date_range, generate_time_slots, parse_offset, parse_time};
