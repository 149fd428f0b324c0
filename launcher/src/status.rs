use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::controller::LaunchState;
use crate::ring_log::{LogLine, RingLog};

/// Launcher state written to `$XDG_STATE_HOME/actkbd-launcher/status.toml`
/// after every command, so the next invocation can show the same backlog.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LauncherStatus {
    /// Launcher version that wrote the file.
    pub version: String,
    /// State the controller ended the last launch in.
    pub state: LaunchState,
    /// Command line of the most recent successful launch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
    /// RFC 3339 timestamp of the most recent successful launch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_launch_timestamp: Option<String>,
    /// Selected index in the device directory listing.
    #[serde(default)]
    pub selected_device: usize,
    /// Application log backlog, oldest first.
    #[serde(default)]
    pub log: Vec<LogLine>,
}

impl LauncherStatus {
    /// Constructs the status of a launcher that has never run anything.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: LaunchState::Idle,
            last_command: None,
            last_launch_timestamp: None,
            selected_device: 0,
            log: Vec::new(),
        }
    }

    /// Rebuilds the application log from the saved backlog.
    pub fn restore_log(&self, capacity: usize) -> RingLog {
        RingLog::with_lines(capacity, self.log.iter().cloned())
    }

    /// Copies the current backlog out of `log` without draining it.
    pub fn capture_log(&mut self, log: &RingLog) {
        self.log = log.iter().cloned().collect();
    }

    /// Records a successful launch of `command`.
    pub fn record_launch(&mut self, command: &str) {
        self.last_command = Some(command.to_string());
        self.last_launch_timestamp = Some(chrono::Local::now().to_rfc3339());
    }
}

impl Default for LauncherStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the status file at `path`, returning a fresh status if it does not exist.
pub fn load_or_default(path: &Path) -> Result<LauncherStatus> {
    if !path.exists() {
        return Ok(LauncherStatus::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read status file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse status file: {}", path.display()))
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged; a status write never aborts a command.
pub fn write_status(path: &Path, status: &LauncherStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                warn!("Failed to write status file: {e}");
            }
        }
        Err(e) => warn!("Failed to serialize status: {e}"),
    }
}
