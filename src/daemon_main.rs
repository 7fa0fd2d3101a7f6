use std::env::args;

use anyhow::Result;
use clap::Parser;
use dailystreak::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::resolve_application_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    #[cfg(unix)]
    if !args.force {
        use daemonize::Daemonize;

        // Detached from the terminal, so the relative directory has to be resolved first.
        let dir = resolve_application_path(args.dir.clone())?;
        let daemonize = Daemonize::new()
            .working_directory(&dir)
            .stdout(daemonize::Stdio::devnull())
            .stderr(daemonize::Stdio::devnull())
            .execute();
        match daemonize {
            daemonize::Outcome::Parent(parent) => {
                parent.map_err(|e| anyhow::anyhow!("Failed to create daemon {e}"))?;
                println!("Created daemon");
                return Ok(());
            }
            daemonize::Outcome::Child(child) => {
                child.map_err(|e| anyhow::anyhow!("Failed to detach daemon {e}"))?;
                return run(DaemonArgs {
                    dir: Some(dir),
                    ..args
                });
            }
        }
    }

    run(args)
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = resolve_application_path(args.dir)?;
    enable_logging(DAEMON_PREFIX, &app_dir.join("logs"), args.log, args.log_console)?;
    single_thread_runtime()?.block_on(async move { start_daemon(app_dir).await })?;
    Ok(())
}
