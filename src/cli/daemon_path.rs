use std::path::PathBuf;

pub const DAEMON_BINARY_NAME: &str = "dailystreak-daemon";

/// The daemon binary is installed next to the cli one.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name(DAEMON_BINARY_NAME);
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::to_daemon_path;

    #[test]
    #[cfg(unix)]
    fn daemon_sits_next_to_cli() {
        assert_eq!(
            to_daemon_path(PathBuf::from("/usr/local/bin/dailystreak")),
            PathBuf::from("/usr/local/bin/dailystreak-daemon")
        );
    }
}
