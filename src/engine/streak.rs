//! Streak tracker - consecutive-day continuity and the activity map
//!
//! The streak counts consecutive calendar days, ending at the most recently
//! processed day, on which at least one required-daily task was completed.
//! The activity map is a pure aggregation of the completion log so it can
//! always be rebuilt from the system of record alone.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::models::LogEntry;

/// Advance the streak counter for processing day `day`.
///
/// Rules, on the calendar-date granularity only:
/// - first-ever processed day: 1 if a required-daily task was completed,
///   else 0
/// - same day as `last_day`: unchanged (idempotent reprocess, neither
///   double-counts nor double-resets)
/// - exactly the next calendar day: streak + 1 if a required-daily task was
///   completed, else reset to 0
/// - any gap of two or more days: reset to 0
///
/// Days earlier than `last_day` are rejected upstream by the Day Processor
/// before this rule runs.
pub fn advance(
    last_day: Option<NaiveDate>,
    day: NaiveDate,
    streak_days: i64,
    required_done: bool,
) -> i64 {
    let Some(last) = last_day else {
        return if required_done { 1 } else { 0 };
    };

    if day == last {
        return streak_days;
    }

    if Some(day) == last.checked_add_days(Days::new(1)) {
        return if required_done { streak_days + 1 } else { 0 };
    }

    // Gap of >= 2 unprocessed days
    0
}

/// Build the day -> completion-count activity map from log entries.
///
/// `BTreeMap` keeps days ordered for the historical density view.
pub fn activity_map(entries: &[LogEntry]) -> BTreeMap<NaiveDate, i64> {
    let mut map = BTreeMap::new();
    for entry in entries {
        *map.entry(entry.day).or_insert(0) += 1;
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_day_with_required_starts_at_one() {
        assert_eq!(advance(None, day("2025-03-01"), 0, true), 1);
    }

    #[test]
    fn test_first_day_without_required_stays_zero() {
        assert_eq!(advance(None, day("2025-03-01"), 0, false), 0);
    }

    #[test]
    fn test_consecutive_day_increments() {
        assert_eq!(advance(Some(day("2025-03-01")), day("2025-03-02"), 1, true), 2);
    }

    #[test]
    fn test_consecutive_day_without_required_resets() {
        assert_eq!(advance(Some(day("2025-03-01")), day("2025-03-02"), 5, false), 0);
    }

    #[test]
    fn test_same_day_reprocess_is_noop() {
        let d = day("2025-03-02");
        assert_eq!(advance(Some(d), d, 4, true), 4);
        assert_eq!(advance(Some(d), d, 4, false), 4);
    }

    #[test]
    fn test_gap_resets_even_with_completion() {
        assert_eq!(advance(Some(day("2025-03-01")), day("2025-03-04"), 7, true), 0);
    }

    #[test]
    fn test_month_boundary_counts_as_consecutive() {
        assert_eq!(advance(Some(day("2025-02-28")), day("2025-03-01"), 2, true), 3);
    }

    #[test]
    fn test_activity_map_counts_per_day() {
        let entry = |id: i64, d: &str| LogEntry {
            id,
            user_id: 1,
            task_id: id,
            task_name: format!("task-{}", id),
            day: day(d),
            xp_awarded: 10,
            counted_streak: true,
            created_at: String::new(),
        };
        let entries = vec![
            entry(1, "2025-03-01"),
            entry(2, "2025-03-01"),
            entry(3, "2025-03-03"),
        ];

        let map = activity_map(&entries);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&day("2025-03-01")], 2);
        assert_eq!(map[&day("2025-03-03")], 1);
    }
}
