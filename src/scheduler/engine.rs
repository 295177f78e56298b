//! Schedule generation engine
//!
//! Orchestrates one generation run:
//!
//! ```text
//! request ─► validate ─► resolve selection ─► prefetch episodes (bounded)
//!         ─► slot duration ─► slot grid ─► filter episodes ─► allocate
//!         ─► stamp / persist ─► outcome + summary
//! ```
//!
//! Only the prefetch step suspends. Everything after it is synchronous and works
//! on in-memory data. Cursors advanced by a run are returned, not written;
//! [`ScheduleEngine::generate_and_commit`] is the entry point that serialises runs
//! per user and commits cursors after a successful persist, removing the run's
//! items again if the commit fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use uuid::Uuid;

use super::allocator::{allocate, AllocationInput, AllocationPolicy, ShowPlan};
use super::duration::estimate_slot_duration_or;
use super::error::{SchedulerError, SchedulerResult};
use super::filter::{apply_episode_filters, FilterRules};
use super::request::{ContentSelection, GenerationRequest, UserPreferences};
use super::rotation::{cursor_map, RerunPolicy, RotationCursor};
use super::schedule::{build_slot_grid, GenerationOutcome, GenerationStatus, GenerationSummary, NO_CONTENT_AVAILABLE};
use super::time::date_range;
use crate::config::EngineConfig;
use crate::metrics;
use crate::models::WatchRecord;
use crate::storage::repository::{
    CursorRepository, EngineRepository, EpisodeCatalog, EpisodeFetcher, PreferencesRepository, ScheduleStore,
    WatchHistoryRepository, WatchQueueRepository,
};
use crate::storage::writer::ScheduleWriter;
use crate::utils::{dedupe_preserving_order, limit_concurrency};

/// Per-user async locks serialising cursor-committing runs
#[derive(Default)]
struct RunLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RunLocks {
    fn for_user(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(user_id.to_string()).or_default().clone()
    }
}

/// The schedule generation engine
pub struct ScheduleEngine {
    catalog: Arc<dyn EpisodeCatalog>,
    fetcher: Arc<dyn EpisodeFetcher>,
    queue: Arc<dyn WatchQueueRepository>,
    preferences: Arc<dyn PreferencesRepository>,
    history: Arc<dyn WatchHistoryRepository>,
    cursors: Arc<dyn CursorRepository>,
    store: Arc<dyn ScheduleStore>,
    writer: ScheduleWriter,
    config: EngineConfig,
    run_locks: RunLocks,
}

impl ScheduleEngine {
    /// Build an engine whose collaborators all live in one repository
    pub fn from_repository<R: EngineRepository>(repo: Arc<R>, config: EngineConfig) -> Self {
        Self {
            catalog: repo.clone(),
            fetcher: repo.clone(),
            queue: repo.clone(),
            preferences: repo.clone(),
            history: repo.clone(),
            cursors: repo.clone(),
            store: repo.clone(),
            writer: ScheduleWriter::new(repo),
            config,
            run_locks: RunLocks::default(),
        }
    }

    /// Replace the episode fetcher, e.g. with one backed by an upstream catalog
    pub fn with_fetcher(mut self, fetcher: Arc<dyn EpisodeFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate and persist a schedule; cursors are returned, not committed
    pub async fn generate(&self, user_id: &str, request: &GenerationRequest) -> SchedulerResult<GenerationOutcome> {
        self.run(user_id, request, true).await
    }

    /// Generate without persisting anything
    pub async fn preview(&self, user_id: &str, request: &GenerationRequest) -> SchedulerResult<GenerationOutcome> {
        self.run(user_id, request, false).await
    }

    /// Persist advanced cursors
    pub fn commit_cursors(&self, user_id: &str, cursors: &[RotationCursor]) -> SchedulerResult<()> {
        self.cursors
            .save_cursors(user_id, cursors)
            .map_err(|e| SchedulerError::collaborator("save_cursors", format!("{e:#}")))?;
        tracing::debug!(user_id = %user_id, cursors = cursors.len(), "Rotation cursors committed");
        Ok(())
    }

    /// Generate, persist and commit cursors while holding the user's run lock
    ///
    /// Items and cursors live in separate stores. When the cursor save fails the
    /// run's items are deleted again, so a retry starts from the old cursors
    /// without duplicating the schedule. If that cleanup fails too the items stay
    /// behind and the error is logged with the run id.
    pub async fn generate_and_commit(
        &self,
        user_id: &str,
        request: &GenerationRequest,
    ) -> SchedulerResult<GenerationOutcome> {
        let lock = self.run_locks.for_user(user_id);
        let _guard = lock.lock().await;

        let outcome = self.generate(user_id, request).await?;
        if let Err(err) = self.commit_cursors(user_id, &outcome.cursors) {
            metrics::record_generation_error();
            match self.store.delete_run(user_id, &outcome.run_id) {
                Ok(removed) => {
                    tracing::warn!(
                        user_id = %user_id,
                        run_id = %outcome.run_id,
                        removed,
                        "Cursor commit failed, run items rolled back"
                    );
                }
                Err(cleanup) => {
                    tracing::error!(
                        user_id = %user_id,
                        run_id = %outcome.run_id,
                        error = %cleanup,
                        "Cursor commit failed and run items could not be removed"
                    );
                }
            }
            return Err(err);
        }
        Ok(outcome)
    }

    async fn run(&self, user_id: &str, request: &GenerationRequest, persist: bool) -> SchedulerResult<GenerationOutcome> {
        match self.run_inner(user_id, request, persist).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                metrics::record_generation_error();
                tracing::warn!(user_id = %user_id, error = %e, "Schedule generation failed");
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        user_id: &str,
        request: &GenerationRequest,
        persist: bool,
    ) -> SchedulerResult<GenerationOutcome> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        request.validate()?;
        let dates = date_range(request.start_date, request.end_date)?;

        let preferences = self.load_preferences(user_id)?;
        let content_ids = self.resolve_selection(user_id, &request.selection)?;

        tracing::info!(
            user_id = %user_id,
            run_id = %run_id,
            start = %request.start_date,
            end = %request.end_date,
            shows = content_ids.len(),
            "Starting schedule generation"
        );

        let prefetched = self.prefetch(&content_ids).await;
        metrics::record_prefetch_failures(content_ids.len() - prefetched.len());

        let slot_minutes = request
            .slots
            .step_minutes()
            .or(preferences.slot_duration_minutes)
            .unwrap_or_else(|| {
                estimate_slot_duration_or(
                    self.catalog.as_ref(),
                    &content_ids,
                    self.config.default_slot_duration_minutes,
                )
            });
        let labels = request.slots.resolve(slot_minutes)?;
        let slots = build_slot_grid(&dates, &labels, request.timezone_offset.as_deref())?;

        let shows = self.load_shows(&content_ids, &request.filters);
        let cursors = self
            .cursors
            .get_cursors(user_id)
            .map_err(|e| SchedulerError::collaborator("load_cursors", format!("{e:#}")))?;

        let reruns_enabled = request.reruns_enabled.unwrap_or(preferences.reruns_enabled);
        let history = if reruns_enabled {
            self.load_rerun_history(user_id)?
        } else {
            Vec::new()
        };

        let policy = AllocationPolicy {
            max_per_slot: request.max_per_slot.unwrap_or(preferences.max_concurrent_shows),
            strategy: request.strategy.unwrap_or(self.config.default_strategy),
            binge_run_length: request.binge_run_length.unwrap_or(self.config.binge_run_length),
            reruns: reruns_enabled.then(|| {
                RerunPolicy::for_frequency(request.rerun_frequency.unwrap_or(preferences.rerun_frequency))
            }),
            seed: request.seed,
            default_duration_minutes: slot_minutes,
        };
        let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());

        let output = allocate(AllocationInput {
            shows: &shows,
            cursors: cursor_map(cursors),
            slots: &slots,
            policy: &policy,
            as_of,
            history: &history,
        });

        let items = if persist {
            self.writer
                .persist(user_id, &run_id, &output.assignments)
                .map_err(|e| SchedulerError::collaborator("persist_schedule", format!("{e:#}")))?
        } else {
            ScheduleWriter::stamp(user_id, &run_id, &output.assignments)
        };

        let summary = GenerationSummary {
            scheduled: items.len(),
            reruns: output.reruns,
            skipped_slots: output.skipped_slots,
            total_slots: output.total_slots,
            shows_considered: shows.len(),
            shows_prefetched: prefetched.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let status = if items.is_empty() {
            GenerationStatus::NothingSchedulable {
                reason: NO_CONTENT_AVAILABLE.to_string(),
            }
        } else {
            GenerationStatus::Scheduled
        };

        let status_label = match status {
            GenerationStatus::Scheduled => "scheduled",
            GenerationStatus::NothingSchedulable { .. } => "nothing_schedulable",
        };
        metrics::record_generation(&summary, status_label);

        tracing::info!(
            user_id = %user_id,
            run_id = %run_id,
            status = status_label,
            scheduled = summary.scheduled,
            reruns = summary.reruns,
            skipped = summary.skipped_slots,
            slots = summary.total_slots,
            elapsed_ms = summary.elapsed_ms,
            persisted = persist,
            "Schedule generation finished"
        );

        Ok(GenerationOutcome {
            run_id,
            status,
            items,
            cursors: output.cursors,
            summary,
        })
    }

    fn load_preferences(&self, user_id: &str) -> SchedulerResult<UserPreferences> {
        let stored = self
            .preferences
            .get_preferences(user_id)
            .map_err(|e| SchedulerError::collaborator("load_preferences", format!("{e:#}")))?;
        Ok(stored.unwrap_or_else(|| self.config.default_preferences()))
    }

    fn resolve_selection(&self, user_id: &str, selection: &ContentSelection) -> SchedulerResult<Vec<String>> {
        let ids = match selection {
            ContentSelection::Explicit { content_ids } => content_ids.clone(),
            ContentSelection::Queue => self.queue.get_queue(user_id).map_err(|e| {
                SchedulerError::selection_unavailable(format!("watch queue for {user_id}: {e:#}"))
            })?,
        };
        Ok(dedupe_preserving_order(&ids))
    }

    /// Make sure episodes are cached; returns the ids whose fetch succeeded
    async fn prefetch(&self, content_ids: &[String]) -> Vec<String> {
        let fetcher = &self.fetcher;
        let tasks = content_ids.iter().map(|content_id| async move {
            let count = fetcher
                .ensure_episodes_cached(content_id)
                .await
                .with_context(|| format!("prefetch failed for {content_id}"))?;
            tracing::debug!(content_id = %content_id, episodes = count, "Episodes cached");
            Ok::<_, anyhow::Error>(content_id.clone())
        });

        limit_concurrency(tasks, self.config.prefetch_concurrency).await
    }

    /// Catalog lookups per show; unknown or unreadable content is left out
    fn load_shows(&self, content_ids: &[String], filters: &FilterRules) -> Vec<ShowPlan> {
        let mut shows = Vec::with_capacity(content_ids.len());

        for content_id in content_ids {
            let content = match self.catalog.get_content(content_id) {
                Ok(Some(content)) => content,
                Ok(None) => {
                    tracing::warn!(content_id = %content_id, "Unknown content in selection, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(content_id = %content_id, error = %e, "Failed to load content, skipping");
                    continue;
                }
            };

            let episodes = if content.is_single_unit() {
                Vec::new()
            } else {
                match self.catalog.get_episodes(content_id) {
                    Ok(episodes) => apply_episode_filters(&episodes, filters),
                    Err(e) => {
                        tracing::warn!(content_id = %content_id, error = %e, "Failed to load episodes");
                        Vec::new()
                    }
                }
            };

            let filter = filters.get(content_id).cloned();
            shows.push(ShowPlan::new(content, episodes).with_filter(filter));
        }

        shows
    }

    /// Watch history plus previously stored schedule items
    fn load_rerun_history(&self, user_id: &str) -> SchedulerResult<Vec<WatchRecord>> {
        let mut records = self
            .history
            .get_history(user_id)
            .map_err(|e| SchedulerError::collaborator("load_history", format!("{e:#}")))?;

        let scheduled = self
            .store
            .list_items(user_id)
            .map_err(|e| SchedulerError::collaborator("load_schedule", format!("{e:#}")))?;

        records.extend(scheduled.into_iter().map(|item| WatchRecord {
            content_id: item.content_id,
            season: item.season,
            episode: item.episode,
            watched_at: item.scheduled_at,
            duration_minutes: Some(item.duration_minutes),
        }));

        Ok(records)
    }
}
