/// Launch orchestration.
///
/// A launch walks `Idle → Checking → (Duplicate | Launching) →
/// (Launched | Failed) → Idle`.  Every outcome is reported as a line in the
/// caller's [`RingLog`]; nothing here panics or aborts the caller.
///
/// `launch` takes `&mut self`, so two launches through the same controller
/// can never interleave between the duplicate check and the daemon start.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DaemonConfig;
use crate::error::{LaunchError, Result};
use crate::options::{
    build_command_line, build_permission_command, LaunchCommand, LaunchOptions,
    DEFAULT_DAEMON_CONFIG,
};
use crate::paths;
use crate::process_finder::{comm_name, ProcessFinder};
use crate::ring_log::RingLog;
use crate::runner::CommandRunner;
use crate::startup::{self, Persisted};

/// Where the controller currently is in a launch.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LaunchState {
    Idle,
    Checking,
    Duplicate,
    Launching,
    Launched,
    Failed,
}

/// What a single [`LaunchController::launch`] call ended in.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The daemon was already running; nothing was executed.
    Duplicate { pids: Vec<u32> },
    /// The daemon command was handed to the shell.
    Launched {
        command: LaunchCommand,
        /// `None` when making the launch permanent was not requested.
        persisted: Option<Persisted>,
    },
    /// The attempt stopped; the cause has been logged.
    Failed(LaunchError),
}

impl LaunchOutcome {
    /// The state the launch settled in before returning to `Idle`.
    pub fn state(&self) -> LaunchState {
        match self {
            LaunchOutcome::Duplicate { .. } => LaunchState::Duplicate,
            LaunchOutcome::Launched { .. } => LaunchState::Launched,
            LaunchOutcome::Failed(_) => LaunchState::Failed,
        }
    }
}

pub struct LaunchController {
    daemon: DaemonConfig,
    /// Overrides `$HOME/.profile`.
    startup_script: Option<PathBuf>,
    finder: Box<dyn ProcessFinder>,
    runner: Box<dyn CommandRunner>,
    state: LaunchState,
    transitions: Vec<LaunchState>,
}

impl LaunchController {
    pub fn new(
        daemon: DaemonConfig,
        finder: Box<dyn ProcessFinder>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            daemon,
            startup_script: None,
            finder,
            runner,
            state: LaunchState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn with_startup_script(mut self, script: Option<PathBuf>) -> Self {
        self.startup_script = script;
        self
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// States visited by the most recent launch, starting and ending in `Idle`.
    pub fn transitions(&self) -> &[LaunchState] {
        &self.transitions
    }

    /// Checks for a running daemon, starts it with `options`, and makes the
    /// launch permanent if requested.
    pub fn launch(&mut self, options: &LaunchOptions, log: &mut RingLog) -> LaunchOutcome {
        self.transitions.clear();
        self.transitions.push(self.state);

        let outcome = self.attempt(options, log);

        self.enter(LaunchState::Idle);
        outcome
    }

    fn attempt(&mut self, options: &LaunchOptions, log: &mut RingLog) -> LaunchOutcome {
        self.enter(LaunchState::Checking);
        let name = comm_name(&self.daemon.binary).to_string();
        match self.finder.find_by_name(&name) {
            Err(e) => return self.fail(e, log),
            Ok(pids) if !pids.is_empty() => {
                self.enter(LaunchState::Duplicate);
                log.warn(LaunchError::DuplicateInstance { name, pids: pids.clone() }.to_string());
                return LaunchOutcome::Duplicate { pids };
            }
            Ok(_) => {}
        }

        self.enter(LaunchState::Launching);
        let resolved = resolve_config(options, log);
        let command = build_command_line(&resolved, &self.daemon);
        let permission = build_permission_command(&resolved, &self.daemon);

        if let Some(permission) = &permission {
            self.run_permission(permission, log);
        }
        if let Err(e) = self.run_daemon(command.as_str()) {
            return self.fail(e, log);
        }

        self.enter(LaunchState::Launched);
        log.info(format!("Started: {command}"));

        if !resolved.permanent {
            return LaunchOutcome::Launched { command, persisted: None };
        }

        let persisted = match self.make_permanent(&resolved, &command, permission.as_deref()) {
            Ok(persisted) => persisted,
            Err(e) => return self.fail(e, log),
        };
        match persisted {
            Persisted::Appended => log.info("Launch added to the startup script"),
            Persisted::AlreadyPresent => log.info("Config is already permanent!"),
        }
        LaunchOutcome::Launched {
            command,
            persisted: Some(persisted),
        }
    }

    /// Failures of the permission helper are reported but do not stop the
    /// launch; the device may already be readable.
    fn run_permission(&mut self, command: &str, log: &mut RingLog) {
        match self.runner.run(command) {
            Ok(status) if status.success() => debug!("Device permissions adjusted"),
            Ok(status) => log.warn(format!(
                "Permission helper failed: {}",
                LaunchError::CommandFailed {
                    command: command.to_string(),
                    code: status.code(),
                }
            )),
            Err(source) => log.warn(format!(
                "Permission helper failed: {}",
                LaunchError::Spawn {
                    command: command.to_string(),
                    source,
                }
            )),
        }
    }

    fn run_daemon(&mut self, command: &str) -> Result<()> {
        let status = self.runner.run(command).map_err(|source| LaunchError::Spawn {
            command: command.to_string(),
            source,
        })?;
        if !status.success() {
            return Err(LaunchError::CommandFailed {
                command: command.to_string(),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn make_permanent(
        &self,
        options: &LaunchOptions,
        command: &LaunchCommand,
        permission: Option<&str>,
    ) -> Result<Persisted> {
        let script = match &self.startup_script {
            Some(script) => script.clone(),
            None => paths::startup_script_path()?,
        };
        let token = options.device().unwrap_or(command.as_str());
        let lines: Vec<&str> = permission.into_iter().chain([command.as_str()]).collect();
        startup::persist(&script, token, &lines)
    }

    fn fail(&mut self, err: LaunchError, log: &mut RingLog) -> LaunchOutcome {
        log.error(err.to_string());
        self.enter(LaunchState::Failed);
        LaunchOutcome::Failed(err)
    }

    fn enter(&mut self, state: LaunchState) {
        debug!("launch state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }
}

/// Checks that `path` can be opened for both reading and writing.
pub fn validate_config_path(path: &Path) -> Result<()> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(drop)
        .map_err(|source| LaunchError::InvalidConfigPath {
            path: path.to_path_buf(),
            source,
        })
}

/// Returns `options` with an unusable config file replaced by the default.
/// The default itself is accepted as-is; it is usually root-owned.
fn resolve_config(options: &LaunchOptions, log: &mut RingLog) -> LaunchOptions {
    let mut resolved = options.clone();
    let default = Path::new(DEFAULT_DAEMON_CONFIG);
    if resolved.config_file.as_path() == default {
        return resolved;
    }
    if let Err(e) = validate_config_path(&resolved.config_file) {
        log.warn(format!("{e}; using {DEFAULT_DAEMON_CONFIG}"));
        resolved.config_file = default.to_path_buf();
    }
    resolved
}
