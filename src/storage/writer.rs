//! Persistence writer
//!
//! Turns allocator drafts into stamped schedule items and bulk-writes them.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use super::repository::ScheduleStore;
use crate::models::{DraftAssignment, Provenance, ScheduleItem};

/// Stamps provenance on drafts and hands them to the schedule store
#[derive(Clone)]
pub struct ScheduleWriter {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleWriter {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Stamp drafts without storing them
    pub fn stamp(user_id: &str, run_id: &str, drafts: &[DraftAssignment]) -> Vec<ScheduleItem> {
        let created_at = Utc::now();
        drafts
            .iter()
            .map(|draft| ScheduleItem {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                run_id: run_id.to_string(),
                content_id: draft.content_id.clone(),
                season: draft.season,
                episode: draft.episode,
                scheduled_at: draft.scheduled_at,
                duration_minutes: draft.duration_minutes,
                is_rerun: draft.is_rerun,
                provenance: Provenance::Auto,
                created_at,
            })
            .collect()
    }

    /// Stamp and bulk-write drafts in one store call
    pub fn persist(&self, user_id: &str, run_id: &str, drafts: &[DraftAssignment]) -> Result<Vec<ScheduleItem>> {
        let items = Self::stamp(user_id, run_id, drafts);
        if items.is_empty() {
            return Ok(items);
        }

        let written = self
            .store
            .insert_items(&items)
            .with_context(|| format!("Failed to persist schedule for user {user_id}"))?;

        tracing::debug!(user_id = %user_id, run_id = %run_id, written, "Schedule items persisted");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryRepository;
    use chrono::{DateTime, Utc};

    fn draft(content_id: &str, episode: u32) -> DraftAssignment {
        DraftAssignment {
            content_id: content_id.to_string(),
            season: Some(1),
            episode: Some(episode),
            scheduled_at: DateTime::parse_from_rfc3339("2024-01-01T20:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            duration_minutes: 30,
            is_rerun: false,
        }
    }

    #[test]
    fn test_stamp_sets_provenance_and_ids() {
        let items = ScheduleWriter::stamp("u1", "run-1", &[draft("a", 1), draft("a", 2)]);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.provenance == Provenance::Auto));
        assert!(items.iter().all(|i| i.user_id == "u1" && i.run_id == "run-1"));
        assert_ne!(items[0].id, items[1].id);
        assert_eq!(items[1].episode, Some(2));
    }

    #[test]
    fn test_persist_writes_all_items() {
        let repo = Arc::new(MemoryRepository::new());
        let writer = ScheduleWriter::new(repo.clone());

        let items = writer.persist("u1", "run-1", &[draft("a", 1), draft("b", 1)]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_persist_empty_is_noop() {
        let repo = Arc::new(MemoryRepository::new());
        let writer = ScheduleWriter::new(repo.clone());
        assert!(writer.persist("u1", "run-1", &[]).unwrap().is_empty());
        assert!(repo.is_empty());
    }
}
