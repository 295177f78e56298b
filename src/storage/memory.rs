//! In-memory repository
//!
//! Implements every collaborator trait over plain collections. Useful for tests
//! and for embedding the engine where persistence lives elsewhere.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::repository::{
    CatalogStore, CursorRepository, EpisodeCatalog, EpisodeFetcher, PreferencesRepository, ScheduleStore,
    WatchHistoryRepository, WatchQueueRepository,
};
use crate::models::{ContentRef, Episode, EpisodeKey, ScheduleItem, WatchRecord};
use crate::scheduler::request::UserPreferences;
use crate::scheduler::rotation::RotationCursor;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything kept in memory, keyed the way the SQLite tables are
#[derive(Default)]
pub struct MemoryRepository {
    contents: RwLock<HashMap<String, ContentRef>>,
    episodes: RwLock<HashMap<String, BTreeMap<EpisodeKey, Episode>>>,
    /// Episodes a fetch would bring in, simulating the upstream catalog
    remote: RwLock<HashMap<String, Vec<Episode>>>,
    failing: RwLock<HashSet<String>>,
    failing_cursor_saves: RwLock<bool>,
    queues: RwLock<HashMap<String, Vec<String>>>,
    preferences: RwLock<HashMap<String, UserPreferences>>,
    history: RwLock<HashMap<String, Vec<WatchRecord>>>,
    cursors: RwLock<HashMap<String, BTreeMap<String, RotationCursor>>>,
    items: RwLock<Vec<ScheduleItem>>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Add content to the catalog
    pub fn add_content(&self, content: ContentRef) {
        write(&self.contents).insert(content.id.clone(), content);
    }

    /// Add episodes to the catalog
    pub fn add_episodes(&self, episodes: impl IntoIterator<Item = Episode>) {
        let mut cache = write(&self.episodes);
        for episode in episodes {
            cache
                .entry(episode.content_id.clone())
                .or_default()
                .insert(episode.key(), episode);
        }
    }

    /// Stage episodes that only appear once the content is fetched
    pub fn stage_remote_episodes(&self, content_id: impl Into<String>, episodes: Vec<Episode>) {
        write(&self.remote).insert(content_id.into(), episodes);
    }

    /// Make every fetch for `content_id` fail
    pub fn fail_fetch(&self, content_id: impl Into<String>) {
        write(&self.failing).insert(content_id.into());
    }

    /// Make cursor saves fail until switched back off
    pub fn fail_cursor_saves(&self, failing: bool) {
        *write(&self.failing_cursor_saves) = failing;
    }

    /// Number of stored schedule items
    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.items).is_empty()
    }

    /// Clear stored schedule items and cursors
    pub fn clear(&self) {
        write(&self.items).clear();
        write(&self.cursors).clear();
    }
}

impl EpisodeCatalog for MemoryRepository {
    fn get_content(&self, content_id: &str) -> Result<Option<ContentRef>> {
        Ok(read(&self.contents).get(content_id).cloned())
    }

    fn get_episodes(&self, content_id: &str) -> Result<Vec<Episode>> {
        Ok(read(&self.episodes)
            .get(content_id)
            .map(|episodes| episodes.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl CatalogStore for MemoryRepository {
    fn upsert_content(&self, content: &ContentRef) -> Result<()> {
        self.add_content(content.clone());
        Ok(())
    }

    fn upsert_episodes(&self, episodes: &[Episode]) -> Result<usize> {
        self.add_episodes(episodes.iter().cloned());
        Ok(episodes.len())
    }
}

#[async_trait]
impl EpisodeFetcher for MemoryRepository {
    async fn ensure_episodes_cached(&self, content_id: &str) -> Result<usize> {
        if read(&self.failing).contains(content_id) {
            return Err(anyhow!("upstream fetch failed for '{content_id}'"));
        }
        if !read(&self.contents).contains_key(content_id) {
            return Err(anyhow!("content '{content_id}' is not in the catalog"));
        }

        let staged = write(&self.remote).remove(content_id);
        if let Some(episodes) = staged {
            self.add_episodes(episodes);
        }

        Ok(read(&self.episodes).get(content_id).map_or(0, BTreeMap::len))
    }
}

impl WatchQueueRepository for MemoryRepository {
    fn get_queue(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(read(&self.queues).get(user_id).cloned().unwrap_or_default())
    }

    fn set_queue(&self, user_id: &str, content_ids: &[String]) -> Result<()> {
        write(&self.queues).insert(user_id.to_string(), content_ids.to_vec());
        Ok(())
    }
}

impl PreferencesRepository for MemoryRepository {
    fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(read(&self.preferences).get(user_id).cloned())
    }

    fn save_preferences(&self, user_id: &str, preferences: &UserPreferences) -> Result<()> {
        write(&self.preferences).insert(user_id.to_string(), preferences.clone());
        Ok(())
    }
}

impl WatchHistoryRepository for MemoryRepository {
    fn get_history(&self, user_id: &str) -> Result<Vec<WatchRecord>> {
        let mut records = read(&self.history).get(user_id).cloned().unwrap_or_default();
        records.sort_by_key(|record| record.watched_at);
        Ok(records)
    }

    fn record_watch(&self, user_id: &str, record: &WatchRecord) -> Result<()> {
        write(&self.history)
            .entry(user_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

impl CursorRepository for MemoryRepository {
    fn get_cursors(&self, user_id: &str) -> Result<Vec<RotationCursor>> {
        Ok(read(&self.cursors)
            .get(user_id)
            .map(|cursors| cursors.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save_cursors(&self, user_id: &str, cursors: &[RotationCursor]) -> Result<()> {
        if *read(&self.failing_cursor_saves) {
            return Err(anyhow!("cursor store unavailable for '{user_id}'"));
        }
        let mut stored = write(&self.cursors);
        let user = stored.entry(user_id.to_string()).or_default();
        for cursor in cursors {
            user.insert(cursor.content_id.clone(), cursor.clone());
        }
        Ok(())
    }
}

impl ScheduleStore for MemoryRepository {
    fn insert_items(&self, items: &[ScheduleItem]) -> Result<usize> {
        write(&self.items).extend_from_slice(items);
        Ok(items.len())
    }

    fn list_items(&self, user_id: &str) -> Result<Vec<ScheduleItem>> {
        let mut items: Vec<ScheduleItem> = read(&self.items)
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.scheduled_at);
        Ok(items)
    }

    fn delete_run(&self, user_id: &str, run_id: &str) -> Result<usize> {
        let mut items = write(&self.items);
        let before = items.len();
        items.retain(|item| item.user_id != user_id || item.run_id != run_id);
        Ok(before - items.len())
    }
}
