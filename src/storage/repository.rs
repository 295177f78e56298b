//! Repository Pattern for the engine's collaborators
//!
//! The generation engine never talks to a database directly. Everything it reads
//! (catalog, queue, preferences, history, cursors) and the one thing it writes
//! (schedule items) goes through the traits in this module.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScheduleEngine                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │  EpisodeCatalog, EpisodeFetcher, CursorRepository, etc.     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    ┌─────────┴─────────┐
//!                    ▼                   ▼
//!           ┌─────────────────┐ ┌─────────────────┐
//!           │     SQLite      │ │     Memory      │
//!           │  Implementation │ │ Implementation  │
//!           └─────────────────┘ └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use showrunner::storage::repository::SqliteRepository;
//!
//! let repo = SqliteRepository::new("showrunner.db")?;
//! let engine = ScheduleEngine::from_repository(Arc::new(repo), config);
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{ContentKind, ContentRef, Episode, EpisodeKey, Provenance, ScheduleItem, WatchRecord};
use crate::scheduler::request::UserPreferences;
use crate::scheduler::rotation::{RerunFrequency, RotationCursor};

// ============================================================================
// Repository Traits
// ============================================================================

/// Read-only view of the content catalog
pub trait EpisodeCatalog: Send + Sync {
    /// Look up a piece of content
    fn get_content(&self, content_id: &str) -> Result<Option<ContentRef>>;

    /// Cached episodes of a show, in any order
    fn get_episodes(&self, content_id: &str) -> Result<Vec<Episode>>;
}

/// Write side of the catalog, used by imports
pub trait CatalogStore: Send + Sync {
    fn upsert_content(&self, content: &ContentRef) -> Result<()>;

    /// Insert or replace episodes; returns how many were written
    fn upsert_episodes(&self, episodes: &[Episode]) -> Result<usize>;
}

/// Makes sure a show's episodes are present in the catalog
#[async_trait]
pub trait EpisodeFetcher: Send + Sync {
    /// Returns the number of episodes cached for the content afterwards
    async fn ensure_episodes_cached(&self, content_id: &str) -> Result<usize>;
}

/// The user's ordered to-watch queue
pub trait WatchQueueRepository: Send + Sync {
    fn get_queue(&self, user_id: &str) -> Result<Vec<String>>;

    fn set_queue(&self, user_id: &str, content_ids: &[String]) -> Result<()>;
}

/// Stored per-user defaults
pub trait PreferencesRepository: Send + Sync {
    fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;

    fn save_preferences(&self, user_id: &str, preferences: &UserPreferences) -> Result<()>;
}

/// What the user has already watched
pub trait WatchHistoryRepository: Send + Sync {
    fn get_history(&self, user_id: &str) -> Result<Vec<WatchRecord>>;

    fn record_watch(&self, user_id: &str, record: &WatchRecord) -> Result<()>;
}

/// Persisted rotation cursors
pub trait CursorRepository: Send + Sync {
    fn get_cursors(&self, user_id: &str) -> Result<Vec<RotationCursor>>;

    /// Upsert cursors; cursors not mentioned are left alone
    fn save_cursors(&self, user_id: &str, cursors: &[RotationCursor]) -> Result<()>;
}

/// Bulk store for generated schedule items
pub trait ScheduleStore: Send + Sync {
    /// Insert all items in one go; returns the number inserted
    fn insert_items(&self, items: &[ScheduleItem]) -> Result<usize>;

    /// Every item stored for a user, ordered by time
    fn list_items(&self, user_id: &str) -> Result<Vec<ScheduleItem>>;

    /// Remove every item a run stored; returns the number removed
    fn delete_run(&self, user_id: &str, run_id: &str) -> Result<usize>;
}

/// A single backend serving every collaborator the engine needs
pub trait EngineRepository:
    EpisodeCatalog
    + EpisodeFetcher
    + WatchQueueRepository
    + PreferencesRepository
    + WatchHistoryRepository
    + CursorRepository
    + ScheduleStore
    + 'static
{
}

impl<T> EngineRepository for T where
    T: EpisodeCatalog
        + EpisodeFetcher
        + WatchQueueRepository
        + PreferencesRepository
        + WatchHistoryRepository
        + CursorRepository
        + ScheduleStore
        + 'static
{
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of every repository trait
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS contents (
                    id TEXT PRIMARY KEY,
                    kind TEXT NOT NULL,
                    title TEXT NOT NULL,
                    release_date TEXT,
                    runtime_minutes INTEGER
                );

                CREATE TABLE IF NOT EXISTS episodes (
                    content_id TEXT NOT NULL,
                    season INTEGER NOT NULL,
                    episode INTEGER NOT NULL,
                    air_date TEXT,
                    duration_minutes INTEGER,
                    PRIMARY KEY (content_id, season, episode)
                );

                CREATE TABLE IF NOT EXISTS watch_queue (
                    user_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    content_id TEXT NOT NULL,
                    PRIMARY KEY (user_id, position)
                );

                CREATE TABLE IF NOT EXISTS preferences (
                    user_id TEXT PRIMARY KEY,
                    reruns_enabled INTEGER NOT NULL,
                    rerun_frequency TEXT NOT NULL,
                    slot_duration_minutes INTEGER,
                    max_concurrent_shows INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS watch_history (
                    user_id TEXT NOT NULL,
                    content_id TEXT NOT NULL,
                    season INTEGER,
                    episode INTEGER,
                    watched_at TEXT NOT NULL,
                    duration_minutes INTEGER
                );

                CREATE INDEX IF NOT EXISTS idx_watch_history_user
                    ON watch_history(user_id);

                CREATE TABLE IF NOT EXISTS rotation_cursors (
                    user_id TEXT NOT NULL,
                    content_id TEXT NOT NULL,
                    next_season INTEGER NOT NULL,
                    next_episode INTEGER NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, content_id)
                );

                CREATE TABLE IF NOT EXISTS schedule_items (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    run_id TEXT NOT NULL,
                    content_id TEXT NOT NULL,
                    season INTEGER,
                    episode INTEGER,
                    scheduled_at TEXT NOT NULL,
                    duration_minutes INTEGER NOT NULL,
                    is_rerun INTEGER NOT NULL DEFAULT 0,
                    provenance TEXT NOT NULL DEFAULT 'auto',
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_schedule_items_user
                    ON schedule_items(user_id, scheduled_at);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    fn count_episodes(conn: &Connection, content_id: &str) -> Result<usize> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM episodes WHERE content_id = ?1",
                params![content_id],
                |row| row.get(0),
            )
            .context("Failed to count episodes")?;
        Ok(count as usize)
    }
}

fn parse_instant(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_optional_date(value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
        })
        .transpose()
}

fn row_to_content(row: &Row<'_>) -> rusqlite::Result<ContentRef> {
    let kind: String = row.get(1)?;
    Ok(ContentRef {
        id: row.get(0)?,
        kind: ContentKind::parse(&kind).unwrap_or_default(),
        title: row.get(2)?,
        release_date: parse_optional_date(row.get(3)?)?,
        runtime_minutes: row.get(4)?,
    })
}

fn row_to_episode(row: &Row<'_>) -> rusqlite::Result<Episode> {
    Ok(Episode {
        content_id: row.get(0)?,
        season: row.get(1)?,
        episode_number: row.get(2)?,
        air_date: parse_optional_date(row.get(3)?)?,
        duration_minutes: row.get(4)?,
    })
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<ScheduleItem> {
    let scheduled_at: String = row.get(6)?;
    let provenance: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    Ok(ScheduleItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        run_id: row.get(2)?,
        content_id: row.get(3)?,
        season: row.get(4)?,
        episode: row.get(5)?,
        scheduled_at: parse_instant(&scheduled_at)?,
        duration_minutes: row.get(7)?,
        is_rerun: row.get(8)?,
        provenance: Provenance::parse(&provenance),
        created_at: parse_instant(&created_at)?,
    })
}

impl EpisodeCatalog for SqliteRepository {
    fn get_content(&self, content_id: &str) -> Result<Option<ContentRef>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, kind, title, release_date, runtime_minutes FROM contents WHERE id = ?1",
            params![content_id],
            row_to_content,
        )
        .optional()
        .context("Failed to load content")
    }

    fn get_episodes(&self, content_id: &str) -> Result<Vec<Episode>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT content_id, season, episode, air_date, duration_minutes
             FROM episodes WHERE content_id = ?1 ORDER BY season, episode",
        )?;
        let episodes = stmt
            .query_map(params![content_id], row_to_episode)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load episodes")?;
        Ok(episodes)
    }
}

impl CatalogStore for SqliteRepository {
    fn upsert_content(&self, content: &ContentRef) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT OR REPLACE INTO contents (id, kind, title, release_date, runtime_minutes)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            params![
                content.id,
                content.kind.as_str(),
                content.title,
                content.release_date.map(|d| d.to_string()),
                content.runtime_minutes,
            ],
        )
        .context("Failed to store content")?;
        Ok(())
    }

    fn upsert_episodes(&self, episodes: &[Episode]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                    INSERT OR REPLACE INTO episodes (content_id, season, episode, air_date, duration_minutes)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
            )?;
            for episode in episodes {
                stmt.execute(params![
                    episode.content_id,
                    episode.season,
                    episode.episode_number,
                    episode.air_date.map(|d| d.to_string()),
                    episode.duration_minutes,
                ])?;
            }
        }
        tx.commit().context("Failed to store episodes")?;
        Ok(episodes.len())
    }
}

#[async_trait]
impl EpisodeFetcher for SqliteRepository {
    /// SQLite only reports what is cached; unknown content is an error
    async fn ensure_episodes_cached(&self, content_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let known: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM contents WHERE id = ?1)",
            params![content_id],
            |row| row.get(0),
        )?;
        if !known {
            return Err(anyhow!("content '{content_id}' is not in the catalog"));
        }
        Self::count_episodes(&conn, content_id)
    }
}

impl WatchQueueRepository for SqliteRepository {
    fn get_queue(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT content_id FROM watch_queue WHERE user_id = ?1 ORDER BY position")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load watch queue")?;
        Ok(ids)
    }

    fn set_queue(&self, user_id: &str, content_ids: &[String]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM watch_queue WHERE user_id = ?1", params![user_id])?;
        for (position, content_id) in content_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO watch_queue (user_id, position, content_id) VALUES (?1, ?2, ?3)",
                params![user_id, position as i64, content_id],
            )?;
        }
        tx.commit().context("Failed to store watch queue")?;
        Ok(())
    }
}

impl PreferencesRepository for SqliteRepository {
    fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let conn = self.lock()?;
        conn.query_row(
            r#"
                SELECT reruns_enabled, rerun_frequency, slot_duration_minutes, max_concurrent_shows
                FROM preferences WHERE user_id = ?1
                "#,
            params![user_id],
            |row| {
                let frequency: String = row.get(1)?;
                let max_concurrent: i64 = row.get(3)?;
                Ok(UserPreferences {
                    reruns_enabled: row.get(0)?,
                    rerun_frequency: frequency.parse::<RerunFrequency>().unwrap_or_default(),
                    slot_duration_minutes: row.get(2)?,
                    max_concurrent_shows: max_concurrent.max(1) as usize,
                })
            },
        )
        .optional()
        .context("Failed to load preferences")
    }

    fn save_preferences(&self, user_id: &str, preferences: &UserPreferences) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT OR REPLACE INTO preferences
                    (user_id, reruns_enabled, rerun_frequency, slot_duration_minutes, max_concurrent_shows)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            params![
                user_id,
                preferences.reruns_enabled,
                preferences.rerun_frequency.id(),
                preferences.slot_duration_minutes,
                preferences.max_concurrent_shows as i64,
            ],
        )
        .context("Failed to store preferences")?;
        Ok(())
    }
}

impl WatchHistoryRepository for SqliteRepository {
    fn get_history(&self, user_id: &str) -> Result<Vec<WatchRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT content_id, season, episode, watched_at, duration_minutes
                FROM watch_history WHERE user_id = ?1 ORDER BY watched_at
                "#,
        )?;
        let records = stmt
            .query_map(params![user_id], |row| {
                let watched_at: String = row.get(3)?;
                Ok(WatchRecord {
                    content_id: row.get(0)?,
                    season: row.get(1)?,
                    episode: row.get(2)?,
                    watched_at: parse_instant(&watched_at)?,
                    duration_minutes: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load watch history")?;
        Ok(records)
    }

    fn record_watch(&self, user_id: &str, record: &WatchRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO watch_history (user_id, content_id, season, episode, watched_at, duration_minutes)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                user_id,
                record.content_id,
                record.season,
                record.episode,
                record.watched_at.to_rfc3339(),
                record.duration_minutes,
            ],
        )
        .context("Failed to record watch")?;
        Ok(())
    }
}

impl CursorRepository for SqliteRepository {
    fn get_cursors(&self, user_id: &str) -> Result<Vec<RotationCursor>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT content_id, next_season, next_episode, completed
                FROM rotation_cursors WHERE user_id = ?1 ORDER BY content_id
                "#,
        )?;
        let cursors = stmt
            .query_map(params![user_id], |row| {
                Ok(RotationCursor {
                    content_id: row.get(0)?,
                    next: EpisodeKey::new(row.get(1)?, row.get(2)?),
                    completed: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load rotation cursors")?;
        Ok(cursors)
    }

    fn save_cursors(&self, user_id: &str, cursors: &[RotationCursor]) -> Result<()> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        for cursor in cursors {
            tx.execute(
                r#"
                    INSERT OR REPLACE INTO rotation_cursors
                        (user_id, content_id, next_season, next_episode, completed, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                params![
                    user_id,
                    cursor.content_id,
                    cursor.next.season,
                    cursor.next.episode,
                    cursor.completed,
                    now,
                ],
            )?;
        }
        tx.commit().context("Failed to store rotation cursors")?;
        Ok(())
    }
}

impl ScheduleStore for SqliteRepository {
    fn insert_items(&self, items: &[ScheduleItem]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                    INSERT INTO schedule_items
                        (id, user_id, run_id, content_id, season, episode, scheduled_at,
                         duration_minutes, is_rerun, provenance, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
            )?;
            for item in items {
                stmt.execute(params![
                    item.id,
                    item.user_id,
                    item.run_id,
                    item.content_id,
                    item.season,
                    item.episode,
                    item.scheduled_at.to_rfc3339(),
                    item.duration_minutes,
                    item.is_rerun,
                    item.provenance.as_str(),
                    item.created_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit().context("Failed to store schedule items")?;
        Ok(items.len())
    }

    fn list_items(&self, user_id: &str) -> Result<Vec<ScheduleItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT id, user_id, run_id, content_id, season, episode, scheduled_at,
                       duration_minutes, is_rerun, provenance, created_at
                FROM schedule_items WHERE user_id = ?1 ORDER BY scheduled_at
                "#,
        )?;
        let items = stmt
            .query_map(params![user_id], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load schedule items")?;
        Ok(items)
    }

    fn delete_run(&self, user_id: &str, run_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM schedule_items WHERE user_id = ?1 AND run_id = ?2",
                params![user_id, run_id],
            )
            .context("Failed to delete schedule items")?;
        Ok(removed)
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared SQLite repository
pub type SharedSqliteRepository = Arc<SqliteRepository>;

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedSqliteRepository> {
    Ok(Arc::new(SqliteRepository::new(path)?))
}

// ============================================================================
// Tests
// ============================================================================
