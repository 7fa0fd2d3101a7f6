use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    storage::{entities::HabitId, key_value::KeyValueStore, repository::HabitRepository},
    utils::{clock::Clock, time::ReminderTime},
};

use super::notifier::{Notifier, Permission};

pub fn reminder_title(habit_name: &str) -> String {
    format!("Habit Reminder: {habit_name}")
}

pub fn reminder_body(habit_name: &str) -> String {
    format!("Don't forget to complete \"{habit_name}\" today!")
}

/// A timer that hasn't fired yet.
struct PendingReminder {
    name: String,
    time: ReminderTime,
    fire_at: NaiveDateTime,
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Registry {
    pending: HashMap<HabitId, PendingReminder>,
    /// Last moment each habit was reminded at, so an occurrence is never shown twice.
    fired: HashMap<HabitId, NaiveDateTime>,
    next_generation: u64,
}

/// Keeps at most one single-shot reminder timer per habit. Scheduling a habit again replaces its
/// pending timer, and the next fire moment is persisted so a restarted daemon picks it up again.
pub struct ReminderScheduler<S, N> {
    repository: Arc<HabitRepository<S>>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    registry: Arc<Mutex<Registry>>,
    /// Held while the persisted fire moment of any habit is read and rewritten.
    persisted: Arc<tokio::sync::Mutex<()>>,
}

impl<S, N> ReminderScheduler<S, N>
where
    S: KeyValueStore + Send + Sync + 'static,
    N: Notifier,
{
    pub fn new(repository: Arc<HabitRepository<S>>, notifier: N, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            notifier: Arc::new(notifier),
            clock,
            registry: Arc::default(),
            persisted: Arc::default(),
        }
    }

    /// Registers a reminder for the next moment matching `reminder_time`. Does nothing when the
    /// host can't show notifications or the user hasn't granted the permission.
    pub async fn schedule_reminder(
        &self,
        habit_id: HabitId,
        habit_name: &str,
        reminder_time: ReminderTime,
    ) -> Result<()> {
        if !self.notifier.is_supported() {
            debug!("Notifications are not supported, skipping reminder for {habit_id}");
            return Ok(());
        }

        let permission = self.notifier.request_permission().await;
        if permission != Permission::Granted {
            debug!("Notification permission is {permission:?}, skipping reminder for {habit_id}");
            return Ok(());
        }

        let _persisted = self.persisted.lock().await;
        let now = self.clock.local_time();
        let mut fire_at = match self.repository.next_reminder(habit_id).await? {
            Some(stored) if stored >= now && stored.time() == reminder_time.time_of_day() => {
                debug!("Reusing stored reminder {stored} for {habit_id}");
                stored
            }
            _ => reminder_time.next_occurrence(now),
        };

        if self
            .lock()
            .fired
            .get(&habit_id)
            .is_some_and(|fired| *fired >= fire_at)
        {
            fire_at += Duration::days(1);
        }

        // Persisted first, a habit that can't be stored stays unscheduled and is retried later.
        self.repository.set_next_reminder(habit_id, fire_at).await?;

        let (generation, cancel) = {
            let mut registry = self.lock();
            if let Some(previous) = registry.pending.remove(&habit_id) {
                debug!("Replacing reminder for {habit_id} due at {}", previous.fire_at);
                previous.cancel.cancel();
            }
            registry.next_generation += 1;
            let generation = registry.next_generation;
            let cancel = CancellationToken::new();
            registry.pending.insert(
                habit_id,
                PendingReminder {
                    name: habit_name.to_string(),
                    time: reminder_time,
                    fire_at,
                    generation,
                    cancel: cancel.clone(),
                },
            );
            (generation, cancel)
        };

        info!("Reminder for {habit_name} ({habit_id}) scheduled at {fire_at}");

        let delay = (fire_at - now).to_std().unwrap_or_default();
        let repository = self.repository.clone();
        let notifier = self.notifier.clone();
        let clock = self.clock.clone();
        let registry = self.registry.clone();
        let persisted = self.persisted.clone();
        let habit_name = habit_name.to_string();

        let span = info_span!("reminder", habit_id);
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Reminder cancelled");
                        return;
                    }
                    _ = clock.sleep(delay) => ()
                }

                if let Err(e) = notifier
                    .show(&reminder_title(&habit_name), &reminder_body(&habit_name))
                    .await
                {
                    error!("Failed to show reminder {e:?}");
                }

                let still_current = {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    let current = registry
                        .pending
                        .get(&habit_id)
                        .is_some_and(|pending| pending.generation == generation);
                    if current {
                        registry.pending.remove(&habit_id);
                        registry.fired.insert(habit_id, fire_at);
                    }
                    current
                };
                if !still_current {
                    return;
                }
                // A reschedule may have stored a newer moment in the meantime.
                let _persisted = persisted.lock().await;
                let cleared = match repository.next_reminder(habit_id).await {
                    Ok(Some(stored)) if stored == fire_at => {
                        repository.clear_next_reminder(habit_id).await
                    }
                    Ok(_) => Ok(()),
                    Err(e) => Err(e),
                };
                if let Err(e) = cleared {
                    warn!("Couldn't clear fired reminder {e:?}");
                }
            }
            .instrument(span),
        );

        Ok(())
    }

    /// Cancels the pending reminder of a habit and forgets its persisted fire moment.
    pub async fn cancel(&self, habit_id: HabitId) -> Result<()> {
        {
            let mut registry = self.lock();
            registry.fired.remove(&habit_id);
            if let Some(pending) = registry.pending.remove(&habit_id) {
                info!("Cancelled reminder for {habit_id} due at {}", pending.fire_at);
                pending.cancel.cancel();
            }
        }
        let _persisted = self.persisted.lock().await;
        self.repository.clear_next_reminder(habit_id).await
    }

    /// Stops every timer but keeps persisted fire moments, used on shutdown.
    pub fn cancel_all(&self) {
        for (_, pending) in self.lock().pending.drain() {
            pending.cancel.cancel();
        }
    }

    /// Whether a timer for exactly this name and time is waiting to fire.
    pub fn is_pending(&self, habit_id: HabitId, habit_name: &str, reminder_time: ReminderTime) -> bool {
        self.lock()
            .pending
            .get(&habit_id)
            .is_some_and(|p| p.name == habit_name && p.time == reminder_time)
    }

    pub fn pending_ids(&self) -> Vec<HabitId> {
        self.lock().pending.keys().copied().collect()
    }

    pub fn next_fire(&self, habit_id: HabitId) -> Option<NaiveDateTime> {
        self.lock().pending.get(&habit_id).map(|p| p.fire_at)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Nothing panics while holding the lock, a poisoned registry is still consistent.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}
