//! Storage adapters for the schedule engine
//!
//! - [`repository`]: collaborator traits plus the SQLite implementation
//! - [`memory`]: in-memory implementation of the same traits
//! - [`writer`]: stamps and bulk-writes generated schedule items
//!
//! Catalog data enters through [`CatalogSnapshot`], a JSON dump of contents and
//! their episodes.

pub mod memory;
pub mod repository;
pub mod writer;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{ContentRef, Episode};

pub use memory::MemoryRepository;
pub use repository::{
    create_sqlite_repository, CatalogStore, CursorRepository, EngineRepository, EpisodeCatalog, EpisodeFetcher,
    PreferencesRepository, ScheduleStore, SqliteRepository, WatchHistoryRepository, WatchQueueRepository,
};
pub use writer::ScheduleWriter;

/// One piece of content with its episodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub content: ContentRef,
    #[serde(default)]
    pub episodes: Vec<CatalogEpisode>,
}

/// Episode as written in a snapshot; the content id comes from the entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEpisode {
    pub season: u32,
    pub episode: u32,
    #[serde(default)]
    pub air_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Import/export format for the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub contents: Vec<CatalogEntry>,
}

/// Counts from an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub contents: usize,
    pub episodes: usize,
}

impl CatalogSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse catalog snapshot")
    }

    /// Load a snapshot from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read catalog snapshot: {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Write every entry into a catalog store
    pub fn import_into(&self, store: &dyn CatalogStore) -> Result<ImportStats> {
        let mut stats = ImportStats::default();

        for entry in &self.contents {
            let content_id = &entry.content.id;
            if content_id.trim().is_empty() {
                tracing::warn!(title = %entry.content.title, "Skipping catalog entry without id");
                continue;
            }

            store.upsert_content(&entry.content)?;
            let episodes: Vec<Episode> = entry
                .episodes
                .iter()
                .filter(|e| e.season >= 1 && e.episode >= 1)
                .map(|e| Episode {
                    content_id: content_id.clone(),
                    season: e.season,
                    episode_number: e.episode,
                    air_date: e.air_date,
                    duration_minutes: e.duration_minutes,
                })
                .collect();

            stats.contents += 1;
            stats.episodes += store.upsert_episodes(&episodes)?;
        }

        tracing::info!(contents = stats.contents, episodes = stats.episodes, "Catalog imported");
        Ok(stats)
    }
}
