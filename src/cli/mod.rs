pub mod daemon_path;
pub mod date;
pub mod habits;
pub mod notifications;
pub mod process;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use habits::{process_habit_command, HabitCommand};
use notifications::{process_notifications_command, NotificationsCommand};
use process::{daemon_executable, kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{start_daemon, STORE_DIR_NAME},
    habits::{error::HabitError, service::HabitService},
    storage::repository::HabitRepository,
    utils::{
        clock::DefaultClock,
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "dailystreak", version, long_about = None)]
#[command(about = "Track daily habits, keep streaks going and get reminded", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Habit(HabitCommand),
    #[command(about = "Decide whether reminders may show desktop notifications")]
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommand,
    },
    #[command(about = "Starts a daemon for the application")]
    Init,
    #[command(about = "Run a daemon directly in current console. Used for debugging")]
    Serve,
    #[command(about = "Stop currently running daemon.")]
    Stop,
}

/// Runs the requested command. Mistakes the user can fix are printed and turned into a failing
/// exit code, anything else is returned.
pub async fn run_cli() -> Result<ExitCode> {
    let args = Args::parse();
    let app_dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    let result = match args.commands {
        Commands::Init => {
            restart_server(&app_dir)?;
            println!("Daemon started");
            Ok(())
        }
        Commands::Stop => {
            match kill_previous_servers(&daemon_executable()?)? {
                0 => println!("No daemon is running"),
                _ => println!("Daemon stopped"),
            }
            Ok(())
        }
        Commands::Serve => start_daemon(app_dir).await,
        Commands::Notifications { command } => {
            let repository = Arc::new(HabitRepository::open(app_dir.join(STORE_DIR_NAME))?);
            process_notifications_command(command, &app_dir, repository).await
        }
        Commands::Habit(command) => {
            let repository = Arc::new(HabitRepository::open(app_dir.join(STORE_DIR_NAME))?);
            let service = HabitService::new(repository, Arc::new(DefaultClock));
            process_habit_command(command, &service).await
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<HabitError>() {
            Some(HabitError::NotFound(_)) => {
                eprintln!("Habit not found. Run `dailystreak list` to see existing habits");
                Ok(ExitCode::FAILURE)
            }
            Some(HabitError::EmptyName) => {
                eprintln!("{e}");
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}
