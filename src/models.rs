// Core data structures for the showrunner schedule engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of content a user can put on their schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Series made of seasons and episodes
    #[default]
    Episodic,
    /// Movie or special, scheduled once
    SingleUnit,
}

impl ContentKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::SingleUnit => "single_unit",
        }
    }

    /// Parse from string (accepts a few common aliases)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "episodic" | "tv" | "show" | "series" => Some(Self::Episodic),
            "single_unit" | "movie" | "film" => Some(Self::SingleUnit),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A show or movie known to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentRef {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    /// Runtime of single-unit content; episodic runtimes live on episodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
}

impl ContentRef {
    /// Create an episodic content reference
    pub fn episodic(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ContentKind::Episodic,
            title: title.into(),
            release_date: None,
            runtime_minutes: None,
        }
    }

    /// Create a single-unit (movie) content reference
    pub fn movie(id: impl Into<String>, title: impl Into<String>, runtime_minutes: u32) -> Self {
        Self {
            id: id.into(),
            kind: ContentKind::SingleUnit,
            title: title.into(),
            release_date: None,
            runtime_minutes: Some(runtime_minutes),
        }
    }

    /// Set the release date
    pub fn with_release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }

    pub fn is_single_unit(&self) -> bool {
        self.kind == ContentKind::SingleUnit
    }
}

/// Position of an episode inside a show, ordered by season then episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeKey {
    /// Position before any real episode
    pub const START: EpisodeKey = EpisodeKey {
        season: 0,
        episode: 0,
    };

    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// The position immediately after this one
    pub fn successor(self) -> Self {
        Self {
            season: self.season,
            episode: self.episode.saturating_add(1),
        }
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// A cached episode of episodic content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub content_id: String,
    pub season: u32,
    pub episode_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl Episode {
    pub fn new(content_id: impl Into<String>, season: u32, episode_number: u32) -> Self {
        Self {
            content_id: content_id.into(),
            season,
            episode_number,
            air_date: None,
            duration_minutes: None,
        }
    }

    pub fn with_air_date(mut self, date: NaiveDate) -> Self {
        self.air_date = Some(date);
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn key(&self) -> EpisodeKey {
        EpisodeKey::new(self.season, self.episode_number)
    }

    /// Whether the episode has not aired as of `as_of`
    pub fn is_future(&self, as_of: NaiveDate) -> bool {
        self.air_date.is_some_and(|date| date > as_of)
    }
}

/// Where a schedule item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by the generation engine
    #[default]
    Auto,
    /// Added or edited by the user
    Manual,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "manual" => Self::Manual,
            _ => Self::Auto,
        }
    }
}

/// Allocator output before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAssignment {
    pub content_id: String,
    /// `None` for single-unit content
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub is_rerun: bool,
}

impl DraftAssignment {
    pub fn episode_key(&self) -> Option<EpisodeKey> {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) => Some(EpisodeKey::new(season, episode)),
            _ => None,
        }
    }

    /// Short display label, e.g. `show-1 S01E02 @ 2024-01-15T18:00:00Z`
    pub fn display(&self) -> String {
        let what = match self.episode_key() {
            Some(key) => format!("{} {}", self.content_id, key),
            None => self.content_id.clone(),
        };
        let rerun = if self.is_rerun { " (rerun)" } else { "" };
        format!(
            "{} @ {} [{}m]{}",
            what,
            self.scheduled_at.to_rfc3339(),
            self.duration_minutes,
            rerun
        )
    }
}

/// A persisted schedule entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: String,
    pub user_id: String,
    pub run_id: String,
    pub content_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub is_rerun: bool,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

/// Something the user already watched or had scheduled; the rerun pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub content_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub watched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl WatchRecord {
    pub fn episode_key(&self) -> Option<EpisodeKey> {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) => Some(EpisodeKey::new(season, episode)),
            _ => None,
        }
    }
}
