//! Generation requests and per-user defaults

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use super::filter::{EpisodeFilterRule, FilterRules};
use super::rotation::{RerunFrequency, RotationStrategy};
use super::time::{generate_time_slots, parse_date, parse_label};

/// Which content a run draws from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSelection {
    /// Explicit content ids, in rotation order
    Explicit { content_ids: Vec<String> },
    /// The user's persisted watch queue
    #[default]
    Queue,
}

impl ContentSelection {
    pub fn explicit<I, S>(content_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Explicit {
            content_ids: content_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Daily time-of-day slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotSpec {
    /// Explicit `HH:MM` labels
    Labels { labels: Vec<String> },
    /// A `start`/`end` window cut into steps; the step defaults to the slot duration
    Window {
        start: String,
        end: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_minutes: Option<u32>,
    },
}

impl SlotSpec {
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Labels {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn window(start: impl Into<String>, end: impl Into<String>, step_minutes: Option<u32>) -> Self {
        Self::Window {
            start: start.into(),
            end: end.into(),
            step_minutes,
        }
    }

    /// Explicit step of a window, if it has one
    pub fn step_minutes(&self) -> Option<u32> {
        match self {
            Self::Labels { .. } => None,
            Self::Window { step_minutes, .. } => *step_minutes,
        }
    }

    /// Expand into daily labels, using `default_step` for windows without a step
    pub fn resolve(&self, default_step: u32) -> SchedulerResult<Vec<String>> {
        let labels = match self {
            Self::Labels { labels } => {
                let mut unique: Vec<String> = Vec::with_capacity(labels.len());
                for label in labels {
                    parse_label(label)?;
                    let label = label.trim().to_string();
                    if !unique.contains(&label) {
                        unique.push(label);
                    }
                }
                unique
            }
            Self::Window {
                start,
                end,
                step_minutes,
            } => generate_time_slots(start, end, step_minutes.unwrap_or(default_step))?,
        };

        if labels.is_empty() {
            return Err(SchedulerError::validation("slots", "no daily time slots in request"));
        }
        Ok(labels)
    }
}

/// A schedule generation request
///
/// Every `Option` override falls back to the user's stored preferences, then to
/// the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// First date, inclusive
    pub start_date: NaiveDate,
    /// Last date, inclusive
    pub end_date: NaiveDate,
    pub slots: SlotSpec,

    /// `±HH:MM`; anything else means UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_slot: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reruns_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerun_frequency: Option<RerunFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RotationStrategy>,
    /// Picks per turn under `round_robin_double`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binge_run_length: Option<usize>,

    #[serde(default)]
    pub filters: FilterRules,
    #[serde(default)]
    pub selection: ContentSelection,

    /// Seed for the random strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Reference date for "already aired"; today when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

impl GenerationRequest {
    /// Create a request drawing from the user's queue with no overrides
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, slots: SlotSpec) -> Self {
        Self {
            start_date,
            end_date,
            slots,
            timezone_offset: None,
            max_per_slot: None,
            reruns_enabled: None,
            rerun_frequency: None,
            strategy: None,
            binge_run_length: None,
            filters: FilterRules::new(),
            selection: ContentSelection::Queue,
            seed: None,
            as_of: None,
        }
    }

    /// Create a request from `YYYY-MM-DD` strings
    pub fn for_dates(start: &str, end: &str, slots: SlotSpec) -> SchedulerResult<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?, slots))
    }

    pub fn with_selection(mut self, selection: ContentSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_timezone_offset(mut self, offset: impl Into<String>) -> Self {
        self.timezone_offset = Some(offset.into());
        self
    }

    pub fn with_max_per_slot(mut self, max: usize) -> Self {
        self.max_per_slot = Some(max);
        self
    }

    pub fn with_reruns(mut self, enabled: bool, frequency: RerunFrequency) -> Self {
        self.reruns_enabled = Some(enabled);
        self.rerun_frequency = Some(frequency);
        self
    }

    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_binge_run_length(mut self, run_length: usize) -> Self {
        self.binge_run_length = Some(run_length);
        self
    }

    pub fn with_filter(mut self, content_id: impl Into<String>, rule: EpisodeFilterRule) -> Self {
        self.filters.insert(content_id.into(), rule);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Reject malformed input before any work is done
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.end_date < self.start_date {
            return Err(SchedulerError::invalid_date_range(self.start_date, self.end_date));
        }

        match &self.slots {
            SlotSpec::Labels { labels } => {
                if labels.is_empty() {
                    return Err(SchedulerError::validation("slots", "no daily time slots in request"));
                }
                for label in labels {
                    parse_label(label)?;
                }
            }
            SlotSpec::Window {
                start,
                end,
                step_minutes,
            } => {
                parse_label(start)?;
                parse_label(end)?;
                if start.trim() == end.trim() {
                    return Err(SchedulerError::validation("slots", "slot window is empty"));
                }
                if *step_minutes == Some(0) {
                    return Err(SchedulerError::validation(
                        "step_minutes",
                        "slot step must be at least one minute",
                    ));
                }
            }
        }

        if self.max_per_slot == Some(0) {
            return Err(SchedulerError::validation("max_per_slot", "must be at least 1"));
        }
        if self.binge_run_length == Some(0) {
            return Err(SchedulerError::validation("binge_run_length", "must be at least 1"));
        }

        Ok(())
    }
}

/// Per-user defaults used when a request omits an override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub reruns_enabled: bool,
    pub rerun_frequency: RerunFrequency,
    /// Preferred slot length; estimated from the selection when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_duration_minutes: Option<u32>,
    /// How many shows may share one slot
    pub max_concurrent_shows: usize,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            reruns_enabled: false,
            rerun_frequency: RerunFrequency::Medium,
            slot_duration_minutes: None,
            max_concurrent_shows: 1,
        }
    }
}
