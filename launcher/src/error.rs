use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while checking for, launching, or persisting
/// the daemon.  None of these abort the launcher; the controller turns each
/// one into a log line.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Instance of {name} already running (pid {})", join_pids(.pids))]
    DuplicateInstance { name: String, pids: Vec<u32> },

    #[error("{} does not have read and write access: {source}", .path.display())]
    InvalidConfigPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has insufficient permission or does not exist: {source}", .path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Startup script unavailable: {0}")]
    StartupScriptUnavailable(String),

    #[error("Process table unavailable: {0}")]
    ProcessTableUnavailable(String),

    #[error("Cannot read device directory {}: {source}", .path.display())]
    DeviceDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}", describe_code(.code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (killed by signal)".to_string(),
    }
}
