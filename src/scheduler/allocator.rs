//! Rotation / rerun allocator
//!
//! The allocator walks the slot grid in chronological order and decides, slot by
//! slot, which shows get their next episode:
//!
//! 1. The **active set** is every show that still has an eligible episode at or
//!    after its cursor (eligible = survived the filters and already aired).
//! 2. An empty active set either skips the slot or, with reruns enabled, replays
//!    something previously watched or scheduled. Reruns never move a cursor.
//! 3. Otherwise up to `max_per_slot` distinct shows are picked by the
//!    [`RotationStrategy`], each receiving its next episode; single-unit content is
//!    scheduled once and then exhausted.
//!
//! [`allocate`] is a pure function: no I/O, no blocking, no retries. Cursors come in
//! and go out as explicit values so that repeated runs are reproducible.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use super::filter::EpisodeFilterRule;
use super::rotation::{
    CursorMap, RerunCandidate, RerunPolicy, RotationCursor, RotationState, RotationStrategy,
    DEFAULT_BINGE_RUN_LENGTH,
};
use super::schedule::TimeSlot;
use crate::models::{ContentRef, DraftAssignment, Episode, EpisodeKey, WatchRecord};

/// Duration used when neither the episode nor the request knows better
pub const DEFAULT_ASSIGNMENT_MINUTES: u32 = 30;

// ============================================================================
// Inputs
// ============================================================================

/// One show ready for allocation
#[derive(Debug, Clone)]
pub struct ShowPlan {
    pub content: ContentRef,
    /// Filtered episodes, ascending by (season, episode)
    pub episodes: Vec<Episode>,
    /// Rule the episodes were filtered with; reruns honour it too
    pub filter: Option<EpisodeFilterRule>,
}

impl ShowPlan {
    /// Create a plan, sorting episodes into rotation order
    pub fn new(content: ContentRef, mut episodes: Vec<Episode>) -> Self {
        episodes.sort_by_key(Episode::key);
        episodes.dedup_by_key(|episode| episode.key());
        Self {
            content,
            episodes,
            filter: None,
        }
    }

    /// Attach the user's filter rule for this show
    pub fn with_filter(mut self, filter: Option<EpisodeFilterRule>) -> Self {
        self.filter = filter;
        self
    }
}

/// Policy knobs for one run
#[derive(Debug, Clone)]
pub struct AllocationPolicy {
    pub max_per_slot: usize,
    pub strategy: RotationStrategy,
    /// Consecutive picks per show under `RoundRobinDouble`
    pub binge_run_length: usize,
    /// `None` disables reruns
    pub reruns: Option<RerunPolicy>,
    /// Seed for the random strategy; `None` draws from entropy
    pub seed: Option<u64>,
    /// Fallback duration for items without a known runtime
    pub default_duration_minutes: u32,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            max_per_slot: 1,
            strategy: RotationStrategy::RoundRobin,
            binge_run_length: DEFAULT_BINGE_RUN_LENGTH,
            reruns: None,
            seed: None,
            default_duration_minutes: DEFAULT_ASSIGNMENT_MINUTES,
        }
    }
}

/// Everything the allocator reads
#[derive(Debug, Clone)]
pub struct AllocationInput<'a> {
    /// Shows in selection order
    pub shows: &'a [ShowPlan],
    /// Starting cursors; shows without one start from the beginning
    pub cursors: CursorMap,
    pub slots: &'a [TimeSlot],
    pub policy: &'a AllocationPolicy,
    /// Episodes airing after this date are not new content yet
    pub as_of: NaiveDate,
    /// Previously watched or scheduled items, the rerun pool
    pub history: &'a [WatchRecord],
}

/// What the allocator produced
#[derive(Debug, Clone, Default)]
pub struct AllocationOutput {
    /// Draft assignments in chronological order
    pub assignments: Vec<DraftAssignment>,
    /// Final cursor of every show, in selection order
    pub cursors: Vec<RotationCursor>,
    pub total_slots: usize,
    pub skipped_slots: usize,
    pub reruns: usize,
}

impl AllocationOutput {
    /// Assignments that are new content rather than reruns
    pub fn new_content_count(&self) -> usize {
        self.assignments.len() - self.reruns
    }
}

// ============================================================================
// Per-show State
// ============================================================================

enum NextUnit<'a> {
    Episode(&'a Episode),
    Movie,
}

struct ShowState<'a> {
    plan: &'a ShowPlan,
    cursor: RotationCursor,
}

impl<'a> ShowState<'a> {
    fn new(plan: &'a ShowPlan, cursor: Option<RotationCursor>) -> Self {
        Self {
            plan,
            cursor: cursor.unwrap_or_else(|| RotationCursor::new(plan.content.id.clone())),
        }
    }

    /// First released unit at or after the cursor
    ///
    /// A future episode does not block later aired ones. Taking a later episode
    /// moves the cursor past the future one, which is then never scheduled.
    fn peek(&self, as_of: NaiveDate) -> Option<NextUnit<'a>> {
        let plan: &'a ShowPlan = self.plan;
        if plan.content.is_single_unit() {
            let released = plan
                .content
                .release_date
                .map_or(true, |date| date <= as_of);
            return (!self.cursor.completed && released).then_some(NextUnit::Movie);
        }

        plan.episodes
            .iter()
            .find(|episode| self.cursor.admits(episode.key()) && !episode.is_future(as_of))
            .map(NextUnit::Episode)
    }

    fn take(&mut self, at: DateTime<Utc>, as_of: NaiveDate, default_minutes: u32) -> Option<DraftAssignment> {
        let plan: &'a ShowPlan = self.plan;
        let content = &plan.content;
        match self.peek(as_of)? {
            NextUnit::Movie => {
                self.cursor.complete();
                Some(DraftAssignment {
                    content_id: content.id.clone(),
                    season: None,
                    episode: None,
                    scheduled_at: at,
                    duration_minutes: content.runtime_minutes.unwrap_or(default_minutes),
                    is_rerun: false,
                })
            }
            NextUnit::Episode(episode) => {
                self.cursor.advance_past(episode.key());
                Some(DraftAssignment {
                    content_id: content.id.clone(),
                    season: Some(episode.season),
                    episode: Some(episode.episode_number),
                    scheduled_at: at,
                    duration_minutes: episode.duration_minutes.unwrap_or(default_minutes),
                    is_rerun: false,
                })
            }
        }
    }
}

// ============================================================================
// Rerun Pool
// ============================================================================

struct RerunPool {
    policy: RerunPolicy,
    candidates: Vec<RerunCandidate>,
    index: HashMap<(String, Option<EpisodeKey>), usize>,
    order: HashMap<String, usize>,
    filters: HashMap<String, EpisodeFilterRule>,
    per_day: HashMap<NaiveDate, usize>,
}

impl RerunPool {
    fn new(policy: RerunPolicy, shows: &[ShowPlan], history: &[WatchRecord]) -> Self {
        let order = shows
            .iter()
            .enumerate()
            .map(|(idx, plan)| (plan.content.id.clone(), idx))
            .collect();
        let filters = shows
            .iter()
            .filter_map(|plan| Some((plan.content.id.clone(), plan.filter.clone()?)))
            .collect();

        let mut pool = Self {
            policy,
            candidates: Vec::new(),
            index: HashMap::new(),
            order,
            filters,
            per_day: HashMap::new(),
        };

        for record in history {
            pool.record(
                &record.content_id,
                record.episode_key(),
                record.watched_at,
                record.duration_minutes,
            );
        }
        pool
    }

    /// Remember a play; only content in the selection that its filter admits is
    /// eligible for reruns
    fn record(&mut self, content_id: &str, key: Option<EpisodeKey>, at: DateTime<Utc>, duration: Option<u32>) {
        let Some(&order) = self.order.get(content_id) else {
            return;
        };
        if let (Some(rule), Some(key)) = (self.filters.get(content_id), key) {
            if !rule.allows_key(key) {
                return;
            }
        }

        let slot = (content_id.to_string(), key);
        if let Some(&idx) = self.index.get(&slot) {
            let candidate = &mut self.candidates[idx];
            if at > candidate.last_played {
                candidate.last_played = at;
            }
            if candidate.duration_minutes.is_none() {
                candidate.duration_minutes = duration;
            }
            return;
        }

        self.index.insert(slot, self.candidates.len());
        self.candidates.push(RerunCandidate {
            content_id: content_id.to_string(),
            key,
            last_played: at,
            order,
            duration_minutes: duration,
        });
    }

    fn take(&mut self, slot: &TimeSlot, at: DateTime<Utc>, default_minutes: u32) -> Option<DraftAssignment> {
        let today = self.per_day.get(&slot.date).copied().unwrap_or(0);
        let idx = self.policy.select(&self.candidates, at, today)?;

        *self.per_day.entry(slot.date).or_insert(0) += 1;
        let candidate = &mut self.candidates[idx];
        candidate.last_played = at;

        Some(DraftAssignment {
            content_id: candidate.content_id.clone(),
            season: candidate.key.map(|k| k.season),
            episode: candidate.key.map(|k| k.episode),
            scheduled_at: at,
            duration_minutes: candidate.duration_minutes.unwrap_or(default_minutes),
            is_rerun: true,
        })
    }
}

// ============================================================================
// Allocation
// ============================================================================

/// Walk the slot grid and assign episodes
pub fn allocate(input: AllocationInput<'_>) -> AllocationOutput {
    let AllocationInput {
        shows,
        mut cursors,
        slots,
        policy,
        as_of,
        history,
    } = input;

    let default_minutes = policy.default_duration_minutes;
    let max_per_slot = policy.max_per_slot.max(1);

    let mut states: Vec<ShowState<'_>> = shows
        .iter()
        .map(|plan| ShowState::new(plan, cursors.remove(&plan.content.id)))
        .collect();
    let mut rotation = RotationState::new(policy.strategy, policy.binge_run_length, states.len(), policy.seed);
    let mut reruns = policy
        .reruns
        .map(|rerun_policy| RerunPool::new(rerun_policy, shows, history));

    let mut ordered: Vec<&TimeSlot> = slots.iter().collect();
    ordered.sort_by_key(|slot| slot.instant());

    let mut output = AllocationOutput {
        total_slots: ordered.len(),
        ..Default::default()
    };

    for slot in ordered {
        let at = slot.instant();
        let active: Vec<bool> = states.iter().map(|state| state.peek(as_of).is_some()).collect();

        if !active.iter().any(|&is_active| is_active) {
            let rerun = reruns
                .as_mut()
                .and_then(|pool| pool.take(slot, at, default_minutes));

            match rerun {
                Some(draft) => {
                    tracing::debug!(slot = %slot.display(), content_id = %draft.content_id, "Filled slot with rerun");
                    output.reruns += 1;
                    output.assignments.push(draft);
                }
                None => {
                    tracing::debug!(slot = %slot.display(), "No eligible content, skipping slot");
                    output.skipped_slots += 1;
                }
            }
            continue;
        }

        for idx in rotation.pick(&active, max_per_slot) {
            let Some(draft) = states[idx].take(at, as_of, default_minutes) else {
                continue;
            };
            if let Some(pool) = reruns.as_mut() {
                pool.record(&draft.content_id, draft.episode_key(), at, Some(draft.duration_minutes));
            }
            tracing::debug!(slot = %slot.display(), assignment = %draft.display(), "Assigned");
            output.assignments.push(draft);
        }
    }

    output.cursors = states.into_iter().map(|state| state.cursor).collect();
    output
}

// ============================================================================
// Tests
// ============================================================================
