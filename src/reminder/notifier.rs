use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{key_value::KeyValueStore, repository::HabitRepository};

/// Answer to a notification permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// The user never decided or dismissed the question.
    #[default]
    Default,
}

/// Host capability for presenting notifications. Presenting is fire-and-forget, there is no
/// delivery confirmation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    fn is_supported(&self) -> bool;

    async fn request_permission(&self) -> Permission;

    async fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// How a notification is handed to the desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationCommand {
    /// `notify-send <title> <body>`
    NotifySend,
    /// `osascript -e 'display notification ...'`
    AppleScript,
    /// Any program taking the title and the body as its two arguments.
    Custom(String),
    Unavailable,
}

impl NotificationCommand {
    /// Picks the command for the current platform unless one was configured.
    pub fn resolve(configured: Option<String>) -> Self {
        if let Some(program) = configured {
            return Self::Custom(program);
        }
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                Self::AppleScript
            } else if #[cfg(unix)] {
                Self::NotifySend
            } else {
                Self::Unavailable
            }
        }
    }

    fn program(&self) -> Option<&str> {
        match self {
            Self::NotifySend => Some("notify-send"),
            Self::AppleScript => Some("osascript"),
            Self::Custom(program) => Some(program),
            Self::Unavailable => None,
        }
    }

    fn args(&self, title: &str, body: &str) -> Vec<String> {
        match self {
            Self::AppleScript => vec![
                "-e".into(),
                format!(
                    "display notification {} with title {}",
                    apple_script_string(body),
                    apple_script_string(title)
                ),
            ],
            _ => vec![title.into(), body.into()],
        }
    }
}

fn apple_script_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Finds an executable either by explicit path or through `PATH`.
fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    })
}

/// Presents notifications through a desktop command. The permission is whatever the user chose
/// with `dailystreak notifications`, kept in the store.
pub struct DesktopNotifier<S> {
    repository: Arc<HabitRepository<S>>,
    command: NotificationCommand,
}

impl<S> DesktopNotifier<S> {
    pub fn new(repository: Arc<HabitRepository<S>>, command: NotificationCommand) -> Self {
        Self {
            repository,
            command,
        }
    }
}

#[async_trait]
impl<S: KeyValueStore + Send + Sync + 'static> Notifier for DesktopNotifier<S> {
    fn is_supported(&self) -> bool {
        self.command.program().and_then(find_program).is_some()
    }

    async fn request_permission(&self) -> Permission {
        match self.repository.notification_permission().await {
            Ok(permission) => permission,
            Err(e) => {
                warn!("Couldn't read notification permission {e:?}");
                Permission::Default
            }
        }
    }

    async fn show(&self, title: &str, body: &str) -> Result<()> {
        let Some(program) = self.command.program() else {
            bail!("No notification command available");
        };
        debug!("Showing notification through {program}");
        let status = tokio::process::Command::new(program)
            .args(self.command.args(title, body))
            .status()
            .await?;
        if !status.success() {
            bail!("{program} exited with {status}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{apple_script_string, find_program, NotificationCommand, Permission};

    #[test]
    fn configured_command_wins() {
        assert_eq!(
            NotificationCommand::resolve(Some("my-notifier".into())),
            NotificationCommand::Custom("my-notifier".into())
        );
    }

    #[test]
    fn custom_command_gets_title_and_body() {
        let command = NotificationCommand::Custom("my-notifier".into());
        assert_eq!(command.args("t", "b"), vec!["t".to_string(), "b".to_string()]);
    }

    #[test]
    fn apple_script_quotes_are_escaped() {
        assert_eq!(apple_script_string(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn missing_program_is_not_found() {
        assert_eq!(find_program("./definitely/not/a/notifier"), None);
    }

    #[test]
    fn permission_is_lowercase_json() -> Result<()> {
        assert_eq!(serde_json::to_string(&Permission::Granted)?, "\"granted\"");
        assert_eq!(
            serde_json::from_str::<Permission>("\"default\"")?,
            Permission::Default
        );
        Ok(())
    }
}
