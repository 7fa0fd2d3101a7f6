use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use sync::ReminderSyncModule;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::Config,
    reminder::{
        notifier::{DesktopNotifier, NotificationCommand, Notifier},
        scheduler::ReminderScheduler,
    },
    storage::{key_value::KeyValueStore, repository::HabitRepository},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod shutdown;
pub mod sync;

pub const STORE_DIR_NAME: &str = "store";

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let config = Config::load(&dir)?;
    let repository = Arc::new(HabitRepository::open(dir.join(STORE_DIR_NAME))?);
    let notifier = DesktopNotifier::new(
        repository.clone(),
        NotificationCommand::resolve(config.notifications.command.clone()),
    );

    std::env::set_current_dir("/")?;

    let shutdown_token = CancellationToken::new();
    let reminders = create_sync_module(
        repository,
        notifier,
        &shutdown_token,
        &config,
        Arc::new(DefaultClock),
    );

    info!("Daemon started in {dir:?}");
    let (_, sync_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        reminders.run(),
    );

    if let Err(sync_result) = sync_result {
        error!("Reminder module got an error {:?}", sync_result);
    }

    Ok(())
}

fn create_sync_module<S, N>(
    repository: Arc<HabitRepository<S>>,
    notifier: N,
    shutdown_token: &CancellationToken,
    config: &Config,
    clock: Arc<dyn Clock>,
) -> ReminderSyncModule<S, N>
where
    S: KeyValueStore + Send + Sync + 'static,
    N: Notifier,
{
    let scheduler = ReminderScheduler::new(repository.clone(), notifier, clock.clone());
    ReminderSyncModule::new(
        repository,
        scheduler,
        shutdown_token.clone(),
        config.daemon.sync_interval(),
        clock,
    )
}
