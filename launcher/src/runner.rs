use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

use tracing::{debug, info};

/// Executes shell command lines on behalf of the controller.
pub trait CommandRunner {
    /// Runs `command` through the shell and waits for the shell to exit.
    /// A command ending in `&` returns as soon as it is backgrounded.
    fn run(&mut self, command: &str) -> io::Result<ExitStatus>;
}

/// Runs commands with `sh -c`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> io::Result<ExitStatus> {
        debug!("sh -c {command:?}");
        Command::new("sh").arg("-c").arg(command).status()
    }
}

/// Logs commands instead of running them and reports success.
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&mut self, command: &str) -> io::Result<ExitStatus> {
        info!("[dry-run] {command}");
        Ok(ExitStatus::from_raw(0))
    }
}

/// Creates the runner for this invocation.
pub fn create_runner(dry_run: bool) -> Box<dyn CommandRunner> {
    if dry_run {
        Box::new(DryRunRunner)
    } else {
        Box::new(ShellRunner)
    }
}
