use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    reminder::{notifier::Notifier, scheduler::ReminderScheduler},
    storage::{entities::HabitId, key_value::KeyValueStore, repository::HabitRepository},
    utils::{clock::Clock, time::ReminderTime},
};

/// Keeps the scheduler in line with the stored habits. Habits are edited by the cli while the
/// daemon runs, so every pass registers new or changed reminders and cancels the ones whose
/// habit disappeared or switched its reminder off. A reminder that already fired gets registered
/// again for its next day on the following pass.
pub struct ReminderSyncModule<S, N> {
    repository: Arc<HabitRepository<S>>,
    scheduler: ReminderScheduler<S, N>,
    shutdown: CancellationToken,
    sync_interval: Duration,
    time_provider: Arc<dyn Clock>,
}

impl<S, N> ReminderSyncModule<S, N>
where
    S: KeyValueStore + Send + Sync + 'static,
    N: Notifier,
{
    pub fn new(
        repository: Arc<HabitRepository<S>>,
        scheduler: ReminderScheduler<S, N>,
        shutdown: CancellationToken,
        sync_interval: Duration,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            scheduler,
            shutdown,
            sync_interval,
            time_provider,
        }
    }

    /// Brings pending reminders in line with the stored habits once.
    pub async fn sync_once(&self) -> Result<()> {
        let active = self
            .repository
            .get_all()
            .await?
            .into_iter()
            .filter_map(|habit| {
                let time = habit.active_reminder()?;
                Some((habit.id, (habit.name, time)))
            })
            .collect::<HashMap<HabitId, (String, ReminderTime)>>();

        // A failing habit is retried on the next pass, the others go on.
        for id in self.scheduler.pending_ids() {
            if !active.contains_key(&id) {
                debug!("Habit {id} no longer wants reminders");
                if let Err(e) = self.scheduler.cancel(id).await {
                    error!("Failed to cancel reminder for {id} {e:?}");
                }
            }
        }

        for (id, (name, time)) in &active {
            if !self.scheduler.is_pending(*id, name, *time) {
                if let Err(e) = self.scheduler.schedule_reminder(*id, name, *time).await {
                    error!("Failed to schedule reminder for {id} {e:?}");
                }
            }
        }

        Ok(())
    }

    /// Executes the sync event loop until shutdown.
    pub async fn run(self) -> Result<()> {
        let mut sync_point = self.time_provider.instant();
        loop {
            sync_point += self.sync_interval;

            let span = info_span!("Syncing reminders");
            if let Err(e) = self.sync_once().instrument(span).await {
                error!("Encountered an error during reminder sync {e:?}")
            }

            tokio::select! {
                // Cancelation stops every pending timer. Fire moments stay persisted for the
                // next start.
                _ = self.shutdown.cancelled() => {
                    info!("Stopping reminders");
                    self.scheduler.cancel_all();
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(sync_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::{bail, Result};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tempfile::{tempdir, TempDir};
    use tokio_util::sync::CancellationToken;

    use crate::{
        reminder::{
            notifier::{MockNotifier, Permission},
            scheduler::ReminderScheduler,
        },
        storage::{
            entities::HabitEntity,
            key_value::{FileStore, KeyValueStore},
            repository::HabitRepository,
        },
        utils::{clock::test_clock::TestClock, logging::TEST_LOGGING},
    };

    use super::ReminderSyncModule;

    const SYNC_INTERVAL: Duration = Duration::from_secs(60 * 10);
    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn module(
        notifier: MockNotifier,
        shutdown: &CancellationToken,
        sync_interval: Duration,
    ) -> Result<(TempDir, Arc<HabitRepository<FileStore>>, ReminderSyncModule<FileStore, MockNotifier>)>
    {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let repository = Arc::new(HabitRepository::new(FileStore::new(dir.path().to_owned())?));
        let clock = eight_am();
        let scheduler = ReminderScheduler::new(repository.clone(), notifier, clock.clone());
        let module = ReminderSyncModule::new(
            repository.clone(),
            scheduler,
            shutdown.clone(),
            sync_interval,
            clock,
        );
        Ok((dir, repository, module))
    }

    fn eight_am() -> Arc<TestClock> {
        Arc::new(TestClock::at(NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        )))
    }

    /// Store that refuses writes to a single key.
    struct FailingStore {
        inner: FileStore,
        failing_key: &'static str,
    }

    impl KeyValueStore for FailingStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<()> {
            if key == self.failing_key {
                bail!("No space left for {key}");
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
    }

    fn granted_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_is_supported().return_const(true);
        notifier
            .expect_request_permission()
            .returning(|| Permission::Granted);
        notifier
    }

    #[tokio::test(start_paused = true)]
    async fn reminds_once_per_day() -> Result<()> {
        let mut notifier = granted_notifier();
        notifier
            .expect_show()
            .withf(|title, _| title == "Habit Reminder: Read")
            .times(2)
            .returning(|_, _| Ok(()));
        let shutdown = CancellationToken::new();
        let (_dir, repository, module) = module(notifier, &shutdown, SYNC_INTERVAL)?;
        repository
            .upsert(HabitEntity::new(1, "Read".into(), Some("09:00".parse()?)))
            .await?;
        repository
            .upsert(HabitEntity::new(2, "Run".into(), None))
            .await?;

        let stop = async {
            // Spans two 09:00 occurrences.
            tokio::time::sleep(HOUR * 26).await;
            shutdown.cancel()
        };
        let (_, result) =
            tokio::time::timeout(HOUR * 27, async { tokio::join!(stop, module.run()) }).await?;
        result?;
        Ok(())
    }

    /// 08:00 start with a one minute interval puts a sync pass exactly on the 08:05 reminder.
    #[tokio::test(start_paused = true)]
    async fn reminder_due_during_sync_pass() -> Result<()> {
        let mut notifier = granted_notifier();
        notifier
            .expect_show()
            .withf(|title, _| title == "Habit Reminder: Read")
            .times(1)
            .returning(|_, _| Ok(()));
        let shutdown = CancellationToken::new();
        let (_dir, repository, module) = module(notifier, &shutdown, Duration::from_secs(60))?;
        repository
            .upsert(HabitEntity::new(1, "Read".into(), Some("08:05".parse()?)))
            .await?;

        let stop = async {
            tokio::time::sleep(Duration::from_secs(60 * 10)).await;
            shutdown.cancel()
        };
        let (_, result) =
            tokio::time::timeout(HOUR, async { tokio::join!(stop, module.run()) }).await?;
        result?;

        let tomorrow = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 5, 21).unwrap(),
            NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
        );
        assert_eq!(repository.next_reminder(1).await?, Some(tomorrow));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn removed_habits_lose_their_timer() -> Result<()> {
        let mut notifier = granted_notifier();
        notifier.expect_show().never();
        let shutdown = CancellationToken::new();
        let (_dir, repository, module) = module(notifier, &shutdown, SYNC_INTERVAL)?;
        repository
            .upsert(HabitEntity::new(1, "Read".into(), Some("09:00".parse()?)))
            .await?;
        let mut disabled = HabitEntity::new(2, "Run".into(), Some("10:00".parse()?));

        repository.upsert(disabled.clone()).await?;
        module.sync_once().await?;
        let mut pending = module.scheduler.pending_ids();
        pending.sort();
        assert_eq!(pending, vec![1, 2]);

        repository.delete(1).await?;
        disabled.set_reminder(None);
        repository.upsert(disabled).await?;
        module.sync_once().await?;
        assert!(module.scheduler.pending_ids().is_empty());
        assert_eq!(repository.next_reminder(2).await?, None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn renamed_habit_is_rescheduled() -> Result<()> {
        let mut notifier = granted_notifier();
        notifier.expect_show().never();
        let shutdown = CancellationToken::new();
        let (_dir, repository, module) = module(notifier, &shutdown, SYNC_INTERVAL)?;
        let mut habit = HabitEntity::new(1, "Read".into(), Some("09:00".parse()?));
        repository.upsert(habit.clone()).await?;
        module.sync_once().await?;

        habit.name = "Read a book".into();
        repository.upsert(habit).await?;
        module.sync_once().await?;
        assert!(module.scheduler.is_pending(1, "Read a book", "09:00".parse()?));
        module.scheduler.cancel_all();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failing_habit_does_not_stop_the_pass() -> Result<()> {
        *TEST_LOGGING;
        let mut notifier = granted_notifier();
        notifier.expect_show().never();
        let dir = tempdir()?;
        let repository = Arc::new(HabitRepository::new(FailingStore {
            inner: FileStore::new(dir.path().to_owned())?,
            failing_key: "reminder-1",
        }));
        let clock = eight_am();
        let scheduler = ReminderScheduler::new(repository.clone(), notifier, clock.clone());
        let module = ReminderSyncModule::new(
            repository.clone(),
            scheduler,
            CancellationToken::new(),
            SYNC_INTERVAL,
            clock,
        );
        repository
            .upsert(HabitEntity::new(1, "Read".into(), Some("09:00".parse()?)))
            .await?;
        repository
            .upsert(HabitEntity::new(2, "Run".into(), Some("10:00".parse()?)))
            .await?;

        module.sync_once().await?;
        assert_eq!(module.scheduler.pending_ids(), vec![2]);
        module.scheduler.cancel_all();
        Ok(())
    }
}
