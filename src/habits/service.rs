use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::{
    storage::{
        entities::{HabitEntity, HabitId, ProgressEntry},
        key_value::KeyValueStore,
        repository::HabitRepository,
    },
    streak::{calculate_streak, check_milestone, is_incomplete_today},
    utils::{clock::Clock, progress::Progress, time::ReminderTime},
};

use super::error::HabitError;

/// What an edit does to the reminder of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderChange {
    Keep,
    Set(ReminderTime),
    Disable,
}

/// Result of logging progress.
#[derive(Debug)]
pub struct ProgressOutcome {
    pub habit: HabitEntity,
    /// Milestone reached by this update that hasn't been celebrated before.
    pub new_milestone: Option<u32>,
}

/// A habit as shown to the user, with the streak recomputed from the log.
#[derive(Debug)]
pub struct HabitView {
    pub habit: HabitEntity,
    pub incomplete_today: bool,
    pub last_progress_update: Option<Progress>,
}

/// The habit workflows: creation, edits, progress updates and removal. Derived fields are
/// recomputed here on every write and read.
pub struct HabitService<S> {
    repository: Arc<HabitRepository<S>>,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> HabitService<S> {
    pub fn new(repository: Arc<HabitRepository<S>>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, reminder: Option<ReminderTime>) -> Result<HabitEntity> {
        let name = validate_name(name)?;
        let existing = self.repository.get_all().await?;

        // Time based ids, nudged forward when two habits are created within the same millisecond.
        let mut id = self.clock.time().timestamp_millis().max(0) as HabitId;
        if let Some(max) = existing.iter().map(|h| h.id).max() {
            id = id.max(max + 1);
        }

        let habit = HabitEntity::new(id, name, reminder);
        self.repository.upsert(habit.clone()).await?;
        info!("Created habit {} ({})", habit.name, habit.id);
        Ok(habit)
    }

    #[instrument(skip(self))]
    pub async fn edit(
        &self,
        id: HabitId,
        name: Option<&str>,
        reminder: ReminderChange,
    ) -> Result<HabitEntity> {
        let name = name.map(validate_name).transpose()?;
        let mut habit = self.find(id).await?;

        if let Some(name) = name {
            habit.name = name;
        }
        match reminder {
            ReminderChange::Keep => {}
            ReminderChange::Set(time) => habit.set_reminder(Some(time)),
            ReminderChange::Disable => habit.set_reminder(None),
        }

        self.repository.upsert(habit.clone()).await?;
        if reminder == ReminderChange::Disable {
            self.repository.clear_next_reminder(id).await?;
        }
        info!("Updated habit {} ({})", habit.name, habit.id);
        Ok(habit)
    }

    /// Appends a progress entry for `date` (today by default) and refreshes the derived state.
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        id: HabitId,
        progress: Progress,
        date: Option<NaiveDate>,
    ) -> Result<ProgressOutcome> {
        let mut habit = self.find(id).await?;
        let today = self.clock.today();

        habit
            .progress_log
            .push(ProgressEntry::new(date.unwrap_or(today), progress));
        habit.progress = progress;
        habit.completed = progress.is_complete();
        habit.streak = calculate_streak(&habit.progress_log, today);

        let new_milestone =
            check_milestone(habit.streak).filter(|milestone| habit.milestone_shown.insert(*milestone));
        if let Some(milestone) = new_milestone {
            info!("{} reached a {milestone}-day streak", habit.name);
        }

        self.repository.upsert(habit.clone()).await?;
        self.repository.set_last_progress_update(id, progress).await?;
        debug!("Habit {id} now has streak {}", habit.streak);

        Ok(ProgressOutcome {
            habit,
            new_milestone,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: HabitId) -> Result<()> {
        if !self.repository.delete(id).await? {
            return Err(HabitError::NotFound(id).into());
        }
        info!("Deleted habit {id}");
        Ok(())
    }

    pub async fn get(&self, id: HabitId) -> Result<HabitView> {
        let habit = self.find(id).await?;
        self.view(habit).await
    }

    pub async fn list(&self) -> Result<Vec<HabitView>> {
        let mut views = vec![];
        for habit in self.repository.get_all().await? {
            views.push(self.view(habit).await?);
        }
        Ok(views)
    }

    async fn view(&self, mut habit: HabitEntity) -> Result<HabitView> {
        let today = self.clock.today();
        habit.streak = calculate_streak(&habit.progress_log, today);
        let last_progress_update = self.repository.last_progress_update(habit.id).await?;
        Ok(HabitView {
            incomplete_today: is_incomplete_today(&habit.progress_log, today),
            habit,
            last_progress_update,
        })
    }

    async fn find(&self, id: HabitId) -> Result<HabitEntity> {
        Ok(self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(HabitError::NotFound(id))?)
    }
}

/// Blank names are refused. Accepted names are stored as typed.
fn validate_name(name: &str) -> Result<String, HabitError> {
    if name.trim().is_empty() {
        Err(HabitError::EmptyName)
    } else {
        Ok(name.to_string())
    }
}
