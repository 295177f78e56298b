//! Rotation strategies, rerun policy and rotation cursors
//!
//! This module holds the policy knobs the allocator is parameterised over:
//! - [`RotationStrategy`] decides which shows fill a slot
//! - [`RerunPolicy`] decides which previously seen item replays in an empty slot
//! - [`RotationCursor`] remembers, per show, the next episode not yet scheduled
//!
//! Everything here is deterministic given its inputs; the random strategy draws
//! from a ChaCha8 generator that can be seeded for reproducible runs.

use chrono::{DateTime, Duration, Utc};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::error::SchedulerError;
use crate::models::EpisodeKey;

// ============================================================================
// Rotation Strategy
// ============================================================================

/// How shows take turns across slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Cyclic order over the selection, resuming where the previous slot stopped
    #[default]
    RoundRobin,
    /// Uniform choice without replacement within each slot
    Random,
    /// Round-robin where each show keeps its turn for a run of consecutive picks
    RoundRobinDouble,
}

impl RotationStrategy {
    pub fn id(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::RoundRobinDouble => "round_robin_double",
        }
    }
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for RotationStrategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "random" | "shuffle" => Ok(Self::Random),
            "round_robin_double" | "double" | "binge" => Ok(Self::RoundRobinDouble),
            _ => Err(SchedulerError::validation(
                "strategy",
                format!("unknown rotation strategy '{s}'"),
            )),
        }
    }
}

/// Consecutive picks a show keeps under [`RotationStrategy::RoundRobinDouble`]
pub const DEFAULT_BINGE_RUN_LENGTH: usize = 2;

// ============================================================================
// Slot Picker
// ============================================================================

/// Mutable rotation state carried across the slots of one run
#[derive(Debug, Clone)]
pub struct RotationState {
    strategy: RotationStrategy,
    run_length: usize,
    position: usize,
    streaks: Vec<usize>,
    rng: ChaCha8Rng,
}

impl RotationState {
    /// Create rotation state for `show_count` shows
    ///
    /// `run_length` only matters for [`RotationStrategy::RoundRobinDouble`].
    pub fn new(strategy: RotationStrategy, run_length: usize, show_count: usize, seed: Option<u64>) -> Self {
        let run_length = match strategy {
            RotationStrategy::RoundRobinDouble => run_length.max(1),
            _ => 1,
        };
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            strategy,
            run_length,
            position: 0,
            streaks: vec![0; show_count],
            rng,
        }
    }

    /// Pick up to `limit` distinct show indices among the active ones
    pub fn pick(&mut self, active: &[bool], limit: usize) -> Vec<usize> {
        if active.is_empty() || limit == 0 {
            return Vec::new();
        }

        match self.strategy {
            RotationStrategy::Random => {
                let pool: Vec<usize> = (0..active.len()).filter(|&i| active[i]).collect();
                shuffle_array(&pool, &mut self.rng)
                    .into_iter()
                    .take(limit)
                    .collect()
            }
            RotationStrategy::RoundRobin | RotationStrategy::RoundRobinDouble => {
                self.pick_cyclic(active, limit)
            }
        }
    }

    fn pick_cyclic(&mut self, active: &[bool], limit: usize) -> Vec<usize> {
        let count = active.len();
        if self.streaks.len() != count {
            self.streaks = vec![0; count];
        }

        let mut picks = Vec::with_capacity(limit.min(count));
        for step in 0..count {
            let idx = (self.position + step) % count;
            if !active[idx] {
                // A show that drops out loses whatever was left of its run
                self.streaks[idx] = 0;
                continue;
            }
            picks.push(idx);
            if picks.len() == limit {
                break;
            }
        }

        // The rotation stays on the first show whose run is unfinished; otherwise it
        // resumes right after the last show picked.
        let mut holding = None;
        for &idx in &picks {
            self.streaks[idx] += 1;
            if self.streaks[idx] >= self.run_length {
                self.streaks[idx] = 0;
            } else if holding.is_none() {
                holding = Some(idx);
            }
        }

        if let Some(idx) = holding {
            self.position = idx;
        } else if let Some(&last) = picks.last() {
            self.position = (last + 1) % count;
        }

        picks
    }
}

/// Return a shuffled copy of `items`
///
/// The result is always a permutation of the input; the input itself is untouched.
pub fn shuffle_array<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

// ============================================================================
// Rerun Policy
// ============================================================================

/// How eagerly empty slots are filled with reruns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerunFrequency {
    Low,
    #[default]
    Medium,
    High,
}

impl RerunFrequency {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RerunFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for RerunFrequency {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "rarely" => Ok(Self::Low),
            "medium" | "sometimes" => Ok(Self::Medium),
            "high" | "often" => Ok(Self::High),
            _ => Err(SchedulerError::validation(
                "rerun_frequency",
                format!("unknown rerun frequency '{s}'"),
            )),
        }
    }
}

/// Something that can be replayed in an empty slot
#[derive(Debug, Clone, PartialEq)]
pub struct RerunCandidate {
    pub content_id: String,
    /// `None` for single-unit content
    pub key: Option<EpisodeKey>,
    pub last_played: DateTime<Utc>,
    /// Position of the content in the selection; earlier wins ties
    pub order: usize,
    pub duration_minutes: Option<u32>,
}

/// Selection rules for reruns
///
/// | tier   | max reruns / day | cooldown |
/// |--------|------------------|----------|
/// | low    | 1                | 7 days   |
/// | medium | 3                | 3 days   |
/// | high   | unlimited        | 1 day    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerunPolicy {
    /// Cap on reruns per local calendar day; `None` means no cap
    pub max_per_day: Option<usize>,

    /// Minimum days between two plays of the same item
    pub cooldown_days: u32,
}

impl RerunPolicy {
    /// Map a frequency tier to its selection rules
    pub fn for_frequency(frequency: RerunFrequency) -> Self {
        match frequency {
            RerunFrequency::Low => Self {
                max_per_day: Some(1),
                cooldown_days: 7,
            },
            RerunFrequency::Medium => Self {
                max_per_day: Some(3),
                cooldown_days: 3,
            },
            RerunFrequency::High => Self {
                max_per_day: None,
                cooldown_days: 1,
            },
        }
    }

    /// Choose which candidate replays at `at`
    ///
    /// Returns the index of the least recently played candidate past its cooldown,
    /// or `None` when the daily cap is reached or nothing is eligible.
    pub fn select(&self, candidates: &[RerunCandidate], at: DateTime<Utc>, reruns_today: usize) -> Option<usize> {
        if self.max_per_day.is_some_and(|max| reruns_today >= max) {
            return None;
        }

        let cooldown = Duration::days(i64::from(self.cooldown_days));

        candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| at - candidate.last_played >= cooldown)
            .min_by(|(_, a), (_, b)| {
                a.last_played
                    .cmp(&b.last_played)
                    .then(a.order.cmp(&b.order))
                    .then(a.key.cmp(&b.key))
            })
            .map(|(idx, _)| idx)
    }
}

impl Default for RerunPolicy {
    fn default() -> Self {
        Self::for_frequency(RerunFrequency::default())
    }
}

// ============================================================================
// Rotation Cursor
// ============================================================================

/// Per (user, content) pointer to the next episode not yet scheduled
///
/// Episodes at or after `next` are still to come. The cursor only ever moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationCursor {
    pub content_id: String,
    pub next: EpisodeKey,
    /// Set once single-unit content has been scheduled
    #[serde(default)]
    pub completed: bool,
}

impl RotationCursor {
    /// Cursor positioned before the first episode
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            next: EpisodeKey::START,
            completed: false,
        }
    }

    /// Cursor positioned at `next`
    pub fn at(content_id: impl Into<String>, next: EpisodeKey) -> Self {
        Self {
            content_id: content_id.into(),
            next,
            completed: false,
        }
    }

    /// Whether the episode at `key` is still ahead of the cursor
    pub fn admits(&self, key: EpisodeKey) -> bool {
        !self.completed && key >= self.next
    }

    /// Move past `key`; earlier keys leave the cursor where it is
    pub fn advance_past(&mut self, key: EpisodeKey) {
        let successor = key.successor();
        if successor > self.next {
            self.next = successor;
        }
    }

    /// Mark single-unit content as done
    pub fn complete(&mut self) {
        self.completed = true;
    }
}

/// Cursors keyed by content id
pub type CursorMap = HashMap<String, RotationCursor>;

/// Index a list of cursors by content id
pub fn cursor_map(cursors: impl IntoIterator<Item = RotationCursor>) -> CursorMap {
    cursors
        .into_iter()
        .map(|cursor| (cursor.content_id.clone(), cursor))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(day: u32, hour: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2024-01-{day:02}T{hour:02}:00:00Z"))
            .unwrap()
            .with_timezone(&Utc)
    }

    fn drive(state: &mut RotationState, active: &[bool], limit: usize, rounds: usize) -> Vec<Vec<usize>> {
        (0..rounds).map(|_| state.pick(active, limit)).collect()
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("round_robin".parse::<RotationStrategy>().unwrap(), RotationStrategy::RoundRobin);
        assert_eq!("Round-Robin-Double".parse::<RotationStrategy>().unwrap(), RotationStrategy::RoundRobinDouble);
        assert_eq!("random".parse::<RotationStrategy>().unwrap(), RotationStrategy::Random);
        assert!("weighted".parse::<RotationStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde() {
        let json = serde_json::to_string(&RotationStrategy::RoundRobinDouble).unwrap();
        assert_eq!(json, "\"round_robin_double\"");
    }

    #[test]
    fn test_round_robin_single_pick_cycles() {
        let mut state = RotationState::new(RotationStrategy::RoundRobin, 1, 3, Some(1));
        let picks = drive(&mut state, &[true, true, true], 1, 6);
        assert_eq!(picks, vec![vec![0], vec![1], vec![2], vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_round_robin_skips_inactive_and_resumes() {
        let mut state = RotationState::new(RotationStrategy::RoundRobin, 1, 3, Some(1));
        assert_eq!(state.pick(&[true, false, true], 1), vec![0]);
        assert_eq!(state.pick(&[true, false, true], 1), vec![2]);
        assert_eq!(state.pick(&[true, true, true], 1), vec![0]);
        assert_eq!(state.pick(&[true, true, true], 1), vec![1]);
    }

    #[test]
    fn test_round_robin_multiple_per_slot() {
        let mut state = RotationState::new(RotationStrategy::RoundRobin, 1, 3, Some(1));
        let picks = drive(&mut state, &[true, true, true], 2, 3);
        assert_eq!(picks, vec![vec![0, 1], vec![2, 0], vec![1, 2]]);
    }

    #[test]
    fn test_limit_larger_than_active() {
        let mut state = RotationState::new(RotationStrategy::RoundRobin, 1, 3, Some(1));
        assert_eq!(state.pick(&[false, true, false], 3), vec![1]);
        assert!(state.pick(&[false, false, false], 3).is_empty());
    }

    #[test]
    fn test_round_robin_double_pairs() {
        let mut state = RotationState::new(RotationStrategy::RoundRobinDouble, 2, 2, Some(1));
        let picks = drive(&mut state, &[true, true], 1, 6);
        assert_eq!(picks, vec![vec![0], vec![0], vec![1], vec![1], vec![0], vec![0]]);
    }

    #[test]
    fn test_round_robin_double_custom_run_length() {
        let mut state = RotationState::new(RotationStrategy::RoundRobinDouble, 3, 2, Some(1));
        let flat: Vec<usize> = drive(&mut state, &[true, true], 1, 6).into_iter().flatten().collect();
        assert_eq!(flat, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_round_robin_double_moves_on_when_show_drops_out() {
        let mut state = RotationState::new(RotationStrategy::RoundRobinDouble, 2, 2, Some(1));
        assert_eq!(state.pick(&[true, true], 1), vec![0]);
        assert_eq!(state.pick(&[false, true], 1), vec![1]);
        assert_eq!(state.pick(&[false, true], 1), vec![1]);
    }

    #[test]
    fn test_random_picks_distinct_active_shows() {
        let mut state = RotationState::new(RotationStrategy::Random, 1, 5, Some(42));
        let active = [true, false, true, true, false];
        for _ in 0..20 {
            let mut picks = state.pick(&active, 2);
            assert_eq!(picks.len(), 2);
            assert!(picks.iter().all(|&i| active[i]));
            picks.dedup();
            assert_eq!(picks.len(), 2);
        }
    }

    #[test]
    fn test_random_is_reproducible_with_seed() {
        let active = [true; 6];
        let mut a = RotationState::new(RotationStrategy::Random, 1, 6, Some(7));
        let mut b = RotationState::new(RotationStrategy::Random, 1, 6, Some(7));
        assert_eq!(drive(&mut a, &active, 2, 10), drive(&mut b, &active, 2, 10));
    }

    #[test]
    fn test_shuffle_array_is_permutation_and_pure() {
        let items = vec![1, 2, 3, 4, 5, 6, 7];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let shuffled = shuffle_array(&items, &mut rng);

        assert_eq!(items, vec![1, 2, 3, 4, 5, 6, 7]);
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, items);
    }

    #[test]
    fn test_rerun_policy_tiers() {
        let low = RerunPolicy::for_frequency(RerunFrequency::Low);
        let high = RerunPolicy::for_frequency(RerunFrequency::High);
        assert_eq!(low.max_per_day, Some(1));
        assert_eq!(low.cooldown_days, 7);
        assert_eq!(high.max_per_day, None);
        assert_eq!(high.cooldown_days, 1);
        assert_eq!(RerunPolicy::default(), RerunPolicy::for_frequency(RerunFrequency::Medium));
    }

    #[test]
    fn test_rerun_select_least_recent_past_cooldown() {
        let policy = RerunPolicy::for_frequency(RerunFrequency::Medium);
        let candidates = vec![
            RerunCandidate {
                content_id: "a".into(),
                key: Some(EpisodeKey::new(1, 1)),
                last_played: instant(10, 20),
                order: 0,
                duration_minutes: None,
            },
            RerunCandidate {
                content_id: "b".into(),
                key: Some(EpisodeKey::new(1, 1)),
                last_played: instant(2, 20),
                order: 1,
                duration_minutes: None,
            },
            RerunCandidate {
                content_id: "c".into(),
                key: None,
                last_played: instant(14, 20),
                order: 2,
                duration_minutes: None,
            },
        ];

        // On the 15th only a (5 days) and b (13 days) are past the 3-day cooldown
        assert_eq!(policy.select(&candidates, instant(15, 20), 0), Some(1));
        // Daily cap reached
        assert_eq!(policy.select(&candidates, instant(15, 20), 3), None);
        // Nothing past cooldown yet
        assert_eq!(policy.select(&candidates[2..], instant(15, 20), 0), None);
    }

    #[test]
    fn test_rerun_select_breaks_ties_by_selection_order() {
        let policy = RerunPolicy {
            max_per_day: None,
            cooldown_days: 0,
        };
        let make = |id: &str, order| RerunCandidate {
            content_id: id.into(),
            key: None,
            last_played: instant(1, 12),
            order,
            duration_minutes: None,
        };
        let candidates = vec![make("late", 4), make("early", 1)];
        assert_eq!(policy.select(&candidates, instant(1, 12), 0), Some(1));
    }

    #[test]
    fn test_cursor_never_regresses() {
        let mut cursor = RotationCursor::new("show");
        assert!(cursor.admits(EpisodeKey::new(1, 1)));

        cursor.advance_past(EpisodeKey::new(2, 3));
        assert_eq!(cursor.next, EpisodeKey::new(2, 4));
        assert!(!cursor.admits(EpisodeKey::new(2, 3)));
        assert!(cursor.admits(EpisodeKey::new(3, 1)));

        cursor.advance_past(EpisodeKey::new(1, 5));
        assert_eq!(cursor.next, EpisodeKey::new(2, 4));
    }

    #[test]
    fn test_completed_cursor_admits_nothing() {
        let mut cursor = RotationCursor::new("movie");
        cursor.complete();
        assert!(!cursor.admits(EpisodeKey::START));
    }
}
