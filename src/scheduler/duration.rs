//! Slot duration estimation
//!
//! When a request names no slot length, the engine derives one from what the
//! catalog already knows about the selection: the median runtime, rounded to the
//! nearest five minutes.

use statrs::statistics::{Data, Median};

use crate::storage::repository::EpisodeCatalog;

/// Slot length used when nothing in the selection has a known runtime
pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;

const ROUNDING_MINUTES: u32 = 5;

/// Median of `runtimes`, rounded to the nearest five minutes (minimum five)
pub fn median_minutes(runtimes: &[u32]) -> Option<u32> {
    if runtimes.is_empty() {
        return None;
    }

    let data = Data::new(runtimes.iter().map(|&m| f64::from(m)).collect::<Vec<_>>());
    let step = f64::from(ROUNDING_MINUTES);
    let rounded = (data.median() / step).round() * step;

    Some((rounded as u32).max(ROUNDING_MINUTES))
}

/// Known runtimes across the selection
///
/// Episodic content contributes its episode durations, single-unit content its
/// runtime. Catalog failures are logged and contribute nothing.
pub fn collect_runtimes(catalog: &dyn EpisodeCatalog, content_ids: &[String]) -> Vec<u32> {
    let mut runtimes = Vec::new();

    for content_id in content_ids {
        match catalog.get_content(content_id) {
            Ok(Some(content)) if content.is_single_unit() => {
                runtimes.extend(content.runtime_minutes);
            }
            Ok(Some(_)) => match catalog.get_episodes(content_id) {
                Ok(episodes) => runtimes.extend(episodes.iter().filter_map(|e| e.duration_minutes)),
                Err(e) => tracing::warn!(content_id = %content_id, error = %e, "Failed to read episodes"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(content_id = %content_id, error = %e, "Failed to read content"),
        }
    }

    runtimes.retain(|&m| m > 0);
    runtimes
}

/// Suggest a slot duration for the selection, falling back to `fallback`
pub fn estimate_slot_duration_or(catalog: &dyn EpisodeCatalog, content_ids: &[String], fallback: u32) -> u32 {
    median_minutes(&collect_runtimes(catalog, content_ids)).unwrap_or(fallback)
}

/// Suggest a slot duration for the selection
pub fn estimate_slot_duration(catalog: &dyn EpisodeCatalog, content_ids: &[String]) -> u32 {
    estimate_slot_duration_or(catalog, content_ids, DEFAULT_SLOT_DURATION_MINUTES)
}
