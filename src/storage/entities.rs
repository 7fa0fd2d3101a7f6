use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::{progress::Progress, time::ReminderTime};

pub type HabitId = u64;

/// A dated record of how much of a habit was done on a day. Several entries may share a date,
/// every progress update appends a new one.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ProgressEntry {
    pub date: NaiveDate,
    pub progress: Progress,
}

impl ProgressEntry {
    pub fn new(date: NaiveDate, progress: Progress) -> Self {
        Self { date, progress }
    }

    pub fn is_complete_on(&self, date: NaiveDate) -> bool {
        self.date == date && self.progress.is_complete()
    }
}

/// The record kept under the `habits` key. Field names follow the camelCase layout of existing
/// data files, and anything missing falls back to its default.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HabitEntity {
    pub id: HabitId,
    pub name: String,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub progress_log: Vec<ProgressEntry>,
    /// Cached projection of `progress_log`. Never read back as a source of truth.
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub milestone_shown: BTreeSet<u32>,
    #[serde(default)]
    pub reminder_enabled: bool,
    #[serde(default)]
    pub reminder_time: Option<ReminderTime>,
}

impl HabitEntity {
    pub fn new(id: HabitId, name: String, reminder_time: Option<ReminderTime>) -> Self {
        Self {
            id,
            name,
            progress: Progress::default(),
            progress_log: vec![],
            streak: 0,
            completed: false,
            milestone_shown: BTreeSet::new(),
            reminder_enabled: reminder_time.is_some(),
            reminder_time,
        }
    }

    /// Reminder time if the reminder is switched on.
    pub fn active_reminder(&self) -> Option<ReminderTime> {
        self.reminder_time.filter(|_| self.reminder_enabled)
    }

    pub fn set_reminder(&mut self, reminder_time: Option<ReminderTime>) {
        self.reminder_enabled = reminder_time.is_some();
        self.reminder_time = reminder_time;
    }
}
