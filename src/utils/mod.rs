//! Common utilities and helper functions

pub mod concurrency;

pub use concurrency::{limit_concurrency, run_bounded, FailurePolicy};

use std::collections::HashSet;

/// Drop blank and repeated ids, keeping first occurrences in order
pub fn dedupe_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Format minutes as `1h 30m`
pub fn format_minutes_human(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_preserving_order() {
        let ids: Vec<String> = ["b", "a", " b", "", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dedupe_preserving_order(&ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
    }

    #[test]
    fn test_format_minutes_human() {
        assert_eq!(format_minutes_human(45), "45m");
        assert_eq!(format_minutes_human(120), "2h");
        assert_eq!(format_minutes_human(170), "2h 50m");
    }
}
