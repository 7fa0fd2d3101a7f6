//! Streak and milestone computation over a habit's progress log.
//!
//! Everything here is a pure function of the log and the date passed in as "today", so the
//! callers decide which clock is authoritative.

use chrono::{Days, NaiveDate};

use crate::storage::entities::ProgressEntry;

/// Streak lengths worth celebrating.
pub const MILESTONES: [u32; 3] = [7, 30, 100];

/// Current run of consecutive fully complete days ending today.
///
/// Entries are ordered newest first with a stable sort, so entries sharing a date keep the order
/// they were logged in. The walk stops at the first entry that is not a complete entry for the
/// expected day. Duplicates for a date are not merged: the first one is consulted and the next
/// one, still carrying the same date, no longer matches the expected day and ends the walk.
///
/// A chain that is not confirmed complete today is reduced by one.
pub fn calculate_streak(progress_log: &[ProgressEntry], today: NaiveDate) -> u32 {
    if progress_log.is_empty() {
        return 0;
    }

    let mut sorted = progress_log.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut streak = 0u32;
    let mut expected = Some(today);
    for entry in &sorted {
        match expected {
            Some(date) if entry.is_complete_on(date) => {
                streak += 1;
                expected = date.checked_sub_days(Days::new(1));
            }
            _ => break,
        }
    }

    let latest = sorted[0];
    if !latest.is_complete_on(today) {
        streak = streak.saturating_sub(1);
    }

    streak
}

/// Returns the streak back if it lands exactly on a milestone.
pub fn check_milestone(streak: u32) -> Option<u32> {
    MILESTONES.contains(&streak).then_some(streak)
}

/// True unless some entry marks today as fully complete.
pub fn is_incomplete_today(progress_log: &[ProgressEntry], today: NaiveDate) -> bool {
    !progress_log.iter().any(|entry| entry.is_complete_on(today))
}
