//! Wall-clock time utilities
//!
//! Pure helpers shared by the generation engine and the rotation-group batch job:
//! - [`generate_time_slots`] turns a start/end range and a step into `HH:MM` labels
//! - [`parse_time`] resolves a label on a calendar date with a `±HH:MM` offset to UTC
//! - [`date_range`] expands an inclusive date range
//!
//! All arithmetic is done in whole minutes of the day.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use regex::Regex;
use std::sync::OnceLock;

use super::error::{SchedulerError, SchedulerResult};

/// Minutes in a calendar day; also the minute value of the closing `00:00` label
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse an `HH:MM` label into minutes after midnight
pub fn label_minutes(label: &str) -> SchedulerResult<u32> {
    let time = parse_label(label)?;
    Ok(time.hour() * 60 + time.minute())
}

/// Parse an `HH:MM` label
pub fn parse_label(label: &str) -> SchedulerResult<NaiveTime> {
    NaiveTime::parse_from_str(label.trim(), "%H:%M")
        .map_err(|_| SchedulerError::invalid_time(label))
}

/// Format minutes after midnight as a zero-padded `HH:MM` label
///
/// Values of a full day or more wrap, so `1440` renders as `00:00`.
pub fn format_minutes(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Generate the daily time-of-day labels between `start` and `end`
///
/// - `start == end` yields nothing.
/// - `end` after `start`: every slot that fits before `end`; `end` itself is excluded.
/// - `end` at or before `start` crosses midnight: labels run through `00:00` inclusive
///   and stop there, whatever `end` says.
///
/// # Example
/// ```
/// use showrunner::scheduler::time::generate_time_slots;
///
/// let slots = generate_time_slots("18:00", "00:00", 30).unwrap();
/// assert_eq!(slots.len(), 13);
/// assert_eq!(slots.first().map(String::as_str), Some("18:00"));
/// assert_eq!(slots.last().map(String::as_str), Some("00:00"));
/// ```
pub fn generate_time_slots(start: &str, end: &str, step_minutes: u32) -> SchedulerResult<Vec<String>> {
    if step_minutes == 0 {
        return Err(SchedulerError::validation(
            "step_minutes",
            "slot step must be at least one minute",
        ));
    }

    let start_min = label_minutes(start)?;
    let end_min = label_minutes(end)?;

    if start_min == end_min {
        return Ok(Vec::new());
    }

    let mut slots = Vec::new();
    let mut current = start_min;

    if end_min > start_min {
        while current + step_minutes <= end_min {
            slots.push(format_minutes(current));
            current += step_minutes;
        }
    } else {
        // Hard stop at midnight; flagged for product review in DESIGN.md
        while current <= MINUTES_PER_DAY {
            slots.push(format_minutes(current));
            current += step_minutes;
        }
    }

    Ok(slots)
}

fn offset_pattern() -> &'static Regex {
    static OFFSET_RE: OnceLock<Regex> = OnceLock::new();
    OFFSET_RE.get_or_init(|| Regex::new(r"^([+-])(\d{2}):(\d{2})$").expect("Invalid regex pattern"))
}

/// Parse a signed `±HH:MM` offset
///
/// Anything that does not match the pattern, or is out of range, is treated as UTC.
pub fn parse_offset(offset: &str) -> FixedOffset {
    let utc = Utc.fix();

    let Some(caps) = offset_pattern().captures(offset.trim()) else {
        return utc;
    };

    let hours: i32 = caps[2].parse().unwrap_or(0);
    let minutes: i32 = caps[3].parse().unwrap_or(0);
    if minutes >= 60 {
        return utc;
    }

    let seconds = (hours * 60 + minutes) * 60;
    let signed = if &caps[1] == "-" { -seconds } else { seconds };

    FixedOffset::east_opt(signed).unwrap_or(utc)
}

/// Resolve a wall-clock label on `date` to an absolute instant
///
/// `absolute = local time read as UTC − offset`: a western (negative) offset yields a
/// later UTC instant, an eastern one an earlier instant. Crossing midnight moves the
/// calendar date accordingly. A missing or malformed offset means UTC.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use showrunner::scheduler::time::parse_time;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let instant = parse_time("22:00", date, Some("-08:00")).unwrap();
/// assert_eq!(instant.to_rfc3339(), "2024-01-16T06:00:00+00:00");
/// ```
pub fn parse_time(label: &str, date: NaiveDate, offset: Option<&str>) -> SchedulerResult<DateTime<Utc>> {
    let time = parse_label(label)?;
    let offset = offset.map(parse_offset).unwrap_or_else(|| parse_offset(""));
    Ok(resolve_local(date, time, offset))
}

/// Resolve a parsed local time and offset to UTC
pub fn resolve_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    let utc = local - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(value: &str) -> SchedulerResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| SchedulerError::invalid_date(value))
}

/// Every date from `start` to `end`, both inclusive
pub fn date_range(start: NaiveDate, end: NaiveDate) -> SchedulerResult<Vec<NaiveDate>> {
    if end < start {
        return Err(SchedulerError::invalid_date_range(start, end));
    }

    Ok(start.iter_days().take_while(|day| *day <= end).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_equal_start_end_is_empty() {
        assert!(generate_time_slots("20:00", "20:00", 30).unwrap().is_empty());
        assert!(generate_time_slots("00:00", "00:00", 15).unwrap().is_empty());
    }

    #[test]
    fn test_same_day_excludes_end() {
        let slots = generate_time_slots("19:00", "21:00", 30).unwrap();
        assert_eq!(slots, vec!["19:00", "19:30", "20:00", "20:30"]);
    }

    #[test]
    fn test_same_day_uneven_step_only_full_slots() {
        let slots = generate_time_slots("09:00", "10:00", 25).unwrap();
        assert_eq!(slots, vec!["09:00", "09:25"]);
    }

    #[test]
    fn test_midnight_crossing_includes_midnight() {
        let slots = generate_time_slots("18:00", "00:00", 30).unwrap();
        assert_eq!(slots.len(), 13);
        assert_eq!(slots[0], "18:00");
        assert_eq!(slots[12], "00:00");
    }

    #[test]
    fn test_midnight_crossing_hard_stops_at_midnight() {
        let slots = generate_time_slots("22:00", "02:00", 60).unwrap();
        assert_eq!(slots, vec!["22:00", "23:00", "00:00"]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(generate_time_slots("25:00", "26:00", 30).is_err());
        assert!(generate_time_slots("noon", "13:00", 30).is_err());
        assert!(generate_time_slots("12:00", "13:00", 0).is_err());
    }

    #[test]
    fn test_format_minutes_pads() {
        assert_eq!(format_minutes(5), "00:05");
        assert_eq!(format_minutes(9 * 60 + 7), "09:07");
        assert_eq!(format_minutes(MINUTES_PER_DAY), "00:00");
    }

    #[test]
    fn test_parse_time_western_offset() {
        let instant = parse_time("13:00", date(2024, 3, 10), Some("-05:00")).unwrap();
        assert_eq!(instant.date_naive(), date(2024, 3, 10));
        assert_eq!(instant.hour(), 18);
        assert_eq!(instant.minute(), 0);
    }

    #[test]
    fn test_parse_time_rolls_forward() {
        let instant = parse_time("22:00", date(2024, 3, 10), Some("-08:00")).unwrap();
        assert_eq!(instant.date_naive(), date(2024, 3, 11));
        assert_eq!(instant.hour(), 6);
    }

    #[test]
    fn test_parse_time_eastern_offset_rolls_backward() {
        let instant = parse_time("01:30", date(2024, 3, 1), Some("+09:00")).unwrap();
        assert_eq!(instant.date_naive(), date(2024, 2, 29));
        assert_eq!(instant.hour(), 16);
        assert_eq!(instant.minute(), 30);
    }

    #[test]
    fn test_parse_time_bad_offset_is_utc() {
        let d = date(2024, 3, 10);
        let expected = parse_time("13:00", d, None).unwrap();
        assert_eq!(parse_time("13:00", d, Some("EST")).unwrap(), expected);
        assert_eq!(parse_time("13:00", d, Some("-5:00")).unwrap(), expected);
        assert_eq!(parse_time("13:00", d, Some("+05:75")).unwrap(), expected);
        assert_eq!(expected.hour(), 13);
    }

    #[test]
    fn test_parse_time_rejects_bad_label() {
        assert!(parse_time("7pm", date(2024, 3, 10), Some("+00:00")).is_err());
    }

    #[test]
    fn test_parse_offset_half_hour() {
        assert_eq!(parse_offset("+05:30").local_minus_utc(), 5 * 3600 + 30 * 60);
        assert_eq!(parse_offset("-03:30").local_minus_utc(), -(3 * 3600 + 30 * 60));
    }

    #[test]
    fn test_date_range() {
        let days = date_range(date(2024, 2, 27), date(2024, 3, 1)).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], date(2024, 2, 29));

        assert_eq!(date_range(date(2024, 1, 1), date(2024, 1, 1)).unwrap().len(), 1);
        assert!(date_range(date(2024, 1, 2), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15").unwrap(), date(2024, 1, 15));
        assert!(parse_date("15/01/2024").is_err());
    }
}
