use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::{debug, info};

use super::daemon_path::to_daemon_path;

/// Stops every running process started from `name`, except this one and its children.
/// Returns how many were stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get current pid {e}"))?;
    let mut killed = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            debug!("Stopping {pid}");
            // SIGTERM lets the daemon cancel its timers. Windows has no such thing, so it's a
            // hard kill there.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            killed += 1;
        }
    }
    Ok(killed)
}

pub fn daemon_executable() -> Result<PathBuf> {
    Ok(to_daemon_path(env::current_exe()?))
}

/// Shuts down the previous daemon and starts a new one for `dir`. The daemon binary detaches
/// itself, so this only waits for the fork.
pub fn restart_server(dir: &Path) -> Result<()> {
    let daemon = daemon_executable()?;
    kill_previous_servers(&daemon)?;

    let mut command = std::process::Command::new(&daemon);
    command.arg("--dir").arg(dir);
    command.stdin(Stdio::null());

    info!("Spawning {daemon:?}");
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        // The parent side of the fork exits as soon as the daemon is detached.
        let status = command.spawn()?.wait()?;
        if !status.success() {
            return Err(anyhow!("Daemon failed to start ({status})"));
        }
    }
    #[cfg(not(unix))]
    {
        command.arg("--force");
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());
        #[allow(clippy::zombie_processes)]
        command.spawn()?;
    }
    Ok(())
}
