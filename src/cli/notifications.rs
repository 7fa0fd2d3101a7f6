use std::{path::Path, sync::Arc};

use anyhow::Result;
use clap::Subcommand;

use crate::{
    config::Config,
    reminder::notifier::{DesktopNotifier, NotificationCommand, Notifier, Permission},
    storage::{key_value::KeyValueStore, repository::HabitRepository},
};

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationsCommand {
    #[command(about = "Allow reminders to show notifications")]
    Allow,
    #[command(about = "Never show reminder notifications")]
    Deny,
    #[command(about = "Forget the decision, reminders stay silent until allowed")]
    Reset,
    #[command(about = "Print the current decision and whether notifications can be shown")]
    Status,
}

pub async fn process_notifications_command<S>(
    command: NotificationsCommand,
    app_dir: &Path,
    repository: Arc<HabitRepository<S>>,
) -> Result<()>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    let permission = match command {
        NotificationsCommand::Allow => Permission::Granted,
        NotificationsCommand::Deny => Permission::Denied,
        NotificationsCommand::Reset => Permission::Default,
        NotificationsCommand::Status => {
            let config = Config::load(app_dir)?;
            let notifier = DesktopNotifier::new(
                repository,
                NotificationCommand::resolve(config.notifications.command),
            );
            println!(
                "Permission\t{}",
                describe_permission(notifier.request_permission().await)
            );
            println!(
                "Supported\t{}",
                if notifier.is_supported() { "yes" } else { "no" }
            );
            return Ok(());
        }
    };

    repository.set_notification_permission(permission).await?;
    println!("Notifications {}", describe_permission(permission));
    Ok(())
}

fn describe_permission(permission: Permission) -> &'static str {
    match permission {
        Permission::Granted => "allowed",
        Permission::Denied => "denied",
        Permission::Default => "not decided",
    }
}
