use serde::Deserialize;
use std::path::PathBuf;

use crate::config::DaemonConfig;

/// Daemon config used whenever no alternate file has been validated.
pub const DEFAULT_DAEMON_CONFIG: &str = "/etc/actkbd.conf";

/// Flags chosen in the launch form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    /// `-c`: daemon configuration file.
    pub config_file: PathBuf,
    /// `-d`: device name inside the device directory.
    pub device: Option<String>,
    /// `-g`: grab the device exclusively.
    pub grab: bool,
    /// `-q`: suppress console messages.
    pub quiet: bool,
    /// `-x`: show executed commands.
    pub show_exec: bool,
    /// `-s`: show key presses.
    pub show_key: bool,
    /// `-l`: log to syslog.
    pub syslog: bool,
    /// Append the launch to the startup script after a successful run.
    pub permanent: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_DAEMON_CONFIG),
            device: None,
            grab: false,
            quiet: false,
            show_exec: false,
            show_key: false,
            syslog: false,
            permanent: false,
        }
    }
}

impl LaunchOptions {
    /// The chosen device, treating an empty name as "none picked".
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref().filter(|d| !d.is_empty())
    }
}

/// A shell command line built from a [`LaunchOptions`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand(String);

impl LaunchCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the daemon command line.
///
/// Order is fixed: binary, `-c`, `-d`, then `-g -q -x -s -l` for each enabled
/// flag, then the daemonize flag and a trailing `&` so the shell returns
/// immediately.
pub fn build_command_line(options: &LaunchOptions, daemon: &DaemonConfig) -> LaunchCommand {
    let mut cmd = daemon.binary.clone();

    if !options.config_file.as_os_str().is_empty() {
        cmd.push_str(" -c ");
        cmd.push_str(&options.config_file.to_string_lossy());
    }
    if let Some(device) = options.device() {
        cmd.push_str(" -d ");
        cmd.push_str(&daemon.device_path(device));
    }

    let flags = [
        (options.grab, " -g"),
        (options.quiet, " -q"),
        (options.show_exec, " -x"),
        (options.show_key, " -s"),
        (options.syslog, " -l"),
    ];
    for (enabled, flag) in flags {
        if enabled {
            cmd.push_str(flag);
        }
    }

    cmd.push_str(" -D &");
    LaunchCommand(cmd)
}

/// Builds the privileged `chmod` run against the device node before launch.
/// Returns `None` when no device is chosen.
pub fn build_permission_command(options: &LaunchOptions, daemon: &DaemonConfig) -> Option<String> {
    options.device().map(|device| {
        format!(
            "{} chmod {} {}",
            daemon.privilege_helper,
            daemon.device_mode,
            daemon.device_path(device)
        )
    })
}
