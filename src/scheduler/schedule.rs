//! Slot grid and generation results
//!
//! The slot grid is the cross product of every date in the requested range with
//! every daily time-of-day label. A generation run walks it in chronological order
//! and reports what it did through [`GenerationOutcome`] and [`GenerationSummary`].

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::{SchedulerError, SchedulerResult};
use super::rotation::RotationCursor;
use super::time::{label_minutes, parse_label, parse_offset, resolve_local};
use crate::models::ScheduleItem;

/// Reason reported when a run produces no assignments
pub const NO_CONTENT_AVAILABLE: &str = "No content available";

// ============================================================================
// Time Slot
// ============================================================================

/// One bookable point in the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    /// Local calendar date the label falls on
    pub date: NaiveDate,

    /// Local `HH:MM` label
    pub label: String,

    time: NaiveTime,
    offset: FixedOffset,
}

impl TimeSlot {
    /// Create a slot, validating the label
    pub fn new(date: NaiveDate, label: impl Into<String>, offset: Option<&str>) -> SchedulerResult<Self> {
        let label = label.into();
        let time = parse_label(&label)?;
        let offset = parse_offset(offset.unwrap_or_default());

        Ok(Self {
            date,
            label,
            time,
            offset,
        })
    }

    /// Absolute instant of this slot
    pub fn instant(&self) -> DateTime<Utc> {
        resolve_local(self.date, self.time, self.offset)
    }

    /// Format as display string
    pub fn display(&self) -> String {
        format!("{} {} ({})", self.date, self.label, self.offset)
    }
}

/// Build the chronological slot grid for `dates` × `labels`
///
/// Every label lands on its own date whatever order the list is in. The one
/// exception is a `00:00` label following a later label, which closes a window
/// crossing midnight (`22:00, 23:00, 00:00`) and belongs to the next date.
pub fn build_slot_grid(dates: &[NaiveDate], labels: &[String], offset: Option<&str>) -> SchedulerResult<Vec<TimeSlot>> {
    if labels.is_empty() {
        return Err(SchedulerError::validation("slots", "no daily time slots given"));
    }

    let minutes = labels
        .iter()
        .map(|label| label_minutes(label))
        .collect::<SchedulerResult<Vec<_>>>()?;

    let mut grid = Vec::with_capacity(dates.len() * labels.len());
    for &date in dates {
        let mut latest: Option<u32> = None;

        for (label, &minute) in labels.iter().zip(&minutes) {
            let closes_day = minute == 0 && latest.is_some_and(|m| m > 0);
            let day = if closes_day { date + Duration::days(1) } else { date };
            latest = Some(latest.map_or(minute, |m| m.max(minute)));
            grid.push(TimeSlot::new(day, label.clone(), offset)?);
        }
    }

    grid.sort_by_key(TimeSlot::instant);
    grid.dedup_by_key(|slot| slot.instant());
    Ok(grid)
}

// ============================================================================
// Generation Results
// ============================================================================

/// Whether a run produced anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationStatus {
    /// At least one assignment was produced
    Scheduled,
    /// The run succeeded but nothing could be placed
    NothingSchedulable { reason: String },
}

/// Request-level counters for caller-side observability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Assignments produced, reruns included
    pub scheduled: usize,
    /// Of which reruns
    pub reruns: usize,
    /// Slots left empty
    pub skipped_slots: usize,
    /// Slots in the grid
    pub total_slots: usize,
    /// Shows that made it into allocation
    pub shows_considered: usize,
    /// Shows whose prefetch succeeded
    pub shows_prefetched: usize,
    pub elapsed_ms: u64,
}

impl GenerationSummary {
    /// Fraction of slots that received something (0.0 - 1.0)
    pub fn fill_rate(&self) -> f64 {
        if self.total_slots == 0 {
            return 0.0;
        }
        (self.total_slots - self.skipped_slots) as f64 / self.total_slots as f64
    }

    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = String::from("Generation Summary\n");
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("Scheduled: {} ({} reruns)\n", self.scheduled, self.reruns));
        output.push_str(&format!(
            "Slots: {} total, {} skipped ({:.0}% filled)\n",
            self.total_slots,
            self.skipped_slots,
            self.fill_rate() * 100.0
        ));
        output.push_str(&format!(
            "Shows: {} considered, {} prefetched\n",
            self.shows_considered, self.shows_prefetched
        ));
        output.push_str(&format!("Elapsed: {}ms\n", self.elapsed_ms));
        output
    }
}

/// Everything a generation run hands back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub run_id: String,
    pub status: GenerationStatus,
    /// Stamped schedule items in chronological order
    pub items: Vec<ScheduleItem>,
    /// Advanced cursors; persisting them is up to the caller
    pub cursors: Vec<RotationCursor>,
    pub summary: GenerationSummary,
}

impl GenerationOutcome {
    pub fn is_nothing_schedulable(&self) -> bool {
        matches!(self.status, GenerationStatus::NothingSchedulable { .. })
    }

    /// Items grouped by the UTC date they fall on
    pub fn items_by_date(&self) -> HashMap<NaiveDate, Vec<&ScheduleItem>> {
        let mut grouped: HashMap<NaiveDate, Vec<&ScheduleItem>> = HashMap::new();
        for item in &self.items {
            grouped
                .entry(item.scheduled_at.date_naive())
                .or_default()
                .push(item);
        }
        grouped
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> SchedulerResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> SchedulerResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Save to file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> SchedulerResult<()> {
        let json = self.to_json()?;
        tokio::fs::write(path.as_ref(), json)
            .await
            .map_err(|e| SchedulerError::collaborator("save_outcome", e))?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_time_slot_instant_uses_offset() {
        let slot = TimeSlot::new(date(2024, 1, 15), "20:00", Some("-05:00")).unwrap();
        let at = slot.instant();
        assert_eq!(at.date_naive(), date(2024, 1, 16));
        assert_eq!(at.hour(), 1);
    }

    #[test]
    fn test_time_slot_rejects_bad_label() {
        assert!(TimeSlot::new(date(2024, 1, 15), "8pm", None).is_err());
    }

    #[test]
    fn test_grid_is_cross_product_in_order() {
        let dates = [date(2024, 1, 15), date(2024, 1, 16)];
        let grid = build_slot_grid(&dates, &labels(&["19:00", "21:00"]), None).unwrap();

        assert_eq!(grid.len(), 4);
        let rendered: Vec<_> = grid.iter().map(|s| (s.date, s.label.as_str())).collect();
        assert_eq!(
            rendered,
            vec![
                (date(2024, 1, 15), "19:00"),
                (date(2024, 1, 15), "21:00"),
                (date(2024, 1, 16), "19:00"),
                (date(2024, 1, 16), "21:00"),
            ]
        );
        assert!(grid.windows(2).all(|w| w[0].instant() < w[1].instant()));
    }

    #[test]
    fn test_grid_wraps_labels_past_midnight() {
        let dates = [date(2024, 1, 15)];
        let grid = build_slot_grid(&dates, &labels(&["23:00", "00:00"]), Some("+00:00")).unwrap();

        assert_eq!(grid[0].date, date(2024, 1, 15));
        assert_eq!(grid[1].date, date(2024, 1, 16));
        assert!(grid[0].instant() < grid[1].instant());
    }

    #[test]
    fn test_grid_keeps_unordered_labels_on_their_date() {
        let dates = [date(2024, 1, 1)];
        let grid = build_slot_grid(&dates, &labels(&["21:00", "19:00"]), Some("+00:00")).unwrap();

        let rendered: Vec<_> = grid.iter().map(|s| (s.date, s.label.as_str())).collect();
        assert_eq!(
            rendered,
            vec![(date(2024, 1, 1), "19:00"), (date(2024, 1, 1), "21:00")]
        );
        assert!(grid.iter().all(|s| s.instant().date_naive() == date(2024, 1, 1)));
    }

    #[test]
    fn test_grid_leading_midnight_stays_on_date() {
        let dates = [date(2024, 1, 1)];
        let grid = build_slot_grid(&dates, &labels(&["00:00", "20:00"]), None).unwrap();
        assert!(grid.iter().all(|s| s.date == date(2024, 1, 1)));
    }

    #[test]
    fn test_grid_requires_labels() {
        assert!(build_slot_grid(&[date(2024, 1, 15)], &[], None).is_err());
    }

    #[test]
    fn test_summary_fill_rate_and_display() {
        let summary = GenerationSummary {
            scheduled: 6,
            reruns: 1,
            skipped_slots: 2,
            total_slots: 8,
            shows_considered: 2,
            shows_prefetched: 2,
            elapsed_ms: 12,
        };
        assert!((summary.fill_rate() - 0.75).abs() < f64::EPSILON);

        let display = summary.display();
        assert!(display.contains("Scheduled: 6 (1 reruns)"));
        assert!(display.contains("75% filled"));
        assert_eq!(GenerationSummary::default().fill_rate(), 0.0);
    }

    #[test]
    fn test_status_serde() {
        let status = GenerationStatus::NothingSchedulable {
            reason: NO_CONTENT_AVAILABLE.to_string(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("nothing_schedulable"));
        assert!(json.contains(NO_CONTENT_AVAILABLE));
    }
}
