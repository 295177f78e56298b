//! Per-show episode filters
//!
//! Users narrow a show to the seasons or individual episodes they care about.
//! A rule either keeps only the listed items (`include`) or drops them (`exclude`).
//! An empty rule never restricts anything: an include rule with nothing selected
//! must not silently zero out a show.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::models::{Episode, EpisodeKey};

/// How a filter rule treats its seasons and episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Everything passes
    #[default]
    All,
    /// Only listed seasons/episodes pass
    Include,
    /// Listed seasons/episodes are dropped
    Exclude,
}

/// Filter rule for one piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EpisodeFilterRule {
    #[serde(default)]
    pub mode: FilterMode,

    #[serde(default)]
    pub seasons: BTreeSet<u32>,

    /// `(season, episode)` pairs
    #[serde(default)]
    pub episodes: BTreeSet<(u32, u32)>,
}

impl EpisodeFilterRule {
    /// Rule that lets everything through
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep only the given seasons
    pub fn include_seasons(seasons: impl IntoIterator<Item = u32>) -> Self {
        Self {
            mode: FilterMode::Include,
            seasons: seasons.into_iter().collect(),
            episodes: BTreeSet::new(),
        }
    }

    /// Drop the given seasons
    pub fn exclude_seasons(seasons: impl IntoIterator<Item = u32>) -> Self {
        Self {
            mode: FilterMode::Exclude,
            seasons: seasons.into_iter().collect(),
            episodes: BTreeSet::new(),
        }
    }

    /// Add individual `(season, episode)` pairs
    pub fn with_episodes(mut self, episodes: impl IntoIterator<Item = (u32, u32)>) -> Self {
        self.episodes.extend(episodes);
        self
    }

    /// Whether the rule names no seasons and no episodes
    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty() && self.episodes.is_empty()
    }

    fn matches(&self, key: EpisodeKey) -> bool {
        self.seasons.contains(&key.season) || self.episodes.contains(&(key.season, key.episode))
    }

    /// Check whether a single episode passes this rule
    pub fn allows(&self, episode: &Episode) -> bool {
        self.allows_key(episode.key())
    }

    /// Same as [`allows`](Self::allows) for a bare `(season, episode)` key
    pub fn allows_key(&self, key: EpisodeKey) -> bool {
        match self.mode {
            FilterMode::All => true,
            FilterMode::Include => self.is_empty() || self.matches(key),
            FilterMode::Exclude => !self.matches(key),
        }
    }
}

/// Filter rules keyed by content id
pub type FilterRules = HashMap<String, EpisodeFilterRule>;

/// Apply per-content filter rules to a candidate list
///
/// Content with no rule passes unchanged. The input is not modified and the
/// relative order of survivors is kept.
pub fn apply_episode_filters(episodes: &[Episode], rules: &FilterRules) -> Vec<Episode> {
    episodes
        .iter()
        .filter(|episode| {
            rules
                .get(&episode.content_id)
                .map_or(true, |rule| rule.allows(episode))
        })
        .cloned()
        .collect()
}
