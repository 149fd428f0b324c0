use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::options::LaunchOptions;

pub const MIN_LOG_CAPACITY: usize = 1;
pub const MAX_LOG_CAPACITY: usize = 1024;
pub const DEFAULT_LOG_CAPACITY: usize = 16;
pub const DEFAULT_DAEMON_BINARY: &str = "actkbd";
pub const DEFAULT_DEVICE_DIR: &str = "/dev/input/by-id/";
pub const DEFAULT_PRIVILEGE_HELPER: &str = "pkexec";
pub const DEFAULT_DEVICE_MODE: &str = "0777";
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Root configuration structure. Deserialized from
/// `$XDG_CONFIG_HOME/actkbd-launcher/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    /// Defaults for the launch form; CLI flags override them per run.
    #[serde(default)]
    pub options: LaunchOptions,
}

/// How the daemon is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Binary name or path placed at the start of the command line.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Directory of device symlinks; prefixed to the chosen device name.
    #[serde(default = "default_device_dir")]
    pub device_dir: String,
    /// Privileged helper used to open up the device node before launch.
    #[serde(default = "default_privilege_helper")]
    pub privilege_helper: String,
    /// Mode passed to `chmod` on the device node.
    #[serde(default = "default_device_mode")]
    pub device_mode: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_DAEMON_BINARY.to_string(),
            device_dir: DEFAULT_DEVICE_DIR.to_string(),
            privilege_helper: DEFAULT_PRIVILEGE_HELPER.to_string(),
            device_mode: DEFAULT_DEVICE_MODE.to_string(),
        }
    }
}

impl DaemonConfig {
    /// Full path of `device` inside the device directory.
    pub fn device_path(&self, device: &str) -> String {
        if self.device_dir.ends_with('/') {
            format!("{}{device}", self.device_dir)
        } else {
            format!("{}/{device}", self.device_dir)
        }
    }
}

/// Where the process table comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessSource {
    #[default]
    Sysinfo,
    Procfs,
}

/// Launcher behaviour unrelated to the daemon's own flags.
#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// Number of lines kept in the application log. Clamped to [1, 1024].
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default)]
    pub process_source: ProcessSource,
    /// Mount point scanned when `process_source = "procfs"`.
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    /// Overrides `$HOME/.profile` as the script made-permanent commands go to.
    #[serde(default)]
    pub startup_script: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            process_source: ProcessSource::default(),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            startup_script: None,
        }
    }
}

impl LauncherConfig {
    pub fn effective_log_capacity(&self) -> usize {
        self.log_capacity.clamp(MIN_LOG_CAPACITY, MAX_LOG_CAPACITY)
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn default_binary() -> String {
    DEFAULT_DAEMON_BINARY.to_string()
}

fn default_device_dir() -> String {
    DEFAULT_DEVICE_DIR.to_string()
}

fn default_privilege_helper() -> String {
    DEFAULT_PRIVILEGE_HELPER.to_string()
}

fn default_device_mode() -> String {
    DEFAULT_DEVICE_MODE.to_string()
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

fn default_proc_root() -> PathBuf {
    PathBuf::from(DEFAULT_PROC_ROOT)
}
