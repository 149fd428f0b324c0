/// Canonical file paths for launcher data on Linux.
///
///   - config.toml  `$XDG_CONFIG_HOME/actkbd-launcher/`, read by the launcher.
///   - status.toml  `$XDG_STATE_HOME/actkbd-launcher/`, written after every command.
///   - .profile     `$HOME/.profile`, where permanent launches are appended.
use std::path::PathBuf;

use crate::error::{LaunchError, Result};

const APP_DIR_NAME: &str = "actkbd-launcher";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const STARTUP_SCRIPT_NAME: &str = ".profile";

/// Returns `$HOME`, or an error naming the missing variable.
pub fn home_dir() -> Result<PathBuf> {
    non_empty_var("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| LaunchError::StartupScriptUnavailable("HOME is not set".to_string()))
}

/// Returns the launcher config directory: `$XDG_CONFIG_HOME/actkbd-launcher`
/// or `$HOME/.config/actkbd-launcher`.
pub fn config_dir() -> Result<PathBuf> {
    let base = match non_empty_var("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => home_dir()?.join(".config"),
    };
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the launcher state directory: `$XDG_STATE_HOME/actkbd-launcher`
/// or `$HOME/.local/state/actkbd-launcher`.
pub fn state_dir() -> Result<PathBuf> {
    let base = match non_empty_var("XDG_STATE_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => home_dir()?.join(".local").join("state"),
    };
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the full path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Returns the full path to the status file.
pub fn status_file_path() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATUS_FILE_NAME))
}

/// Returns the per-user startup script: `$HOME/.profile`.
pub fn startup_script_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(STARTUP_SCRIPT_NAME))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only read the environment, so they hold for whatever the test
    // runner provides as long as HOME is set.

    #[test]
    fn startup_script_is_profile_in_home() {
        if let Ok(home) = home_dir() {
            assert_eq!(startup_script_path().unwrap(), home.join(".profile"));
        }
    }

    #[test]
    fn config_file_path_has_correct_name() {
        if let Ok(path) = config_file_path() {
            assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
            assert_eq!(path.parent().unwrap().file_name().unwrap(), APP_DIR_NAME);
        }
    }

    #[test]
    fn status_file_path_has_correct_name() {
        if let Ok(path) = status_file_path() {
            assert_eq!(path.file_name().unwrap(), STATUS_FILE_NAME);
            assert_eq!(path.parent().unwrap().file_name().unwrap(), APP_DIR_NAME);
        }
    }
}
