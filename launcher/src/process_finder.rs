use std::path::PathBuf;

use procfs::process::all_processes_with_root;
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

use crate::config::{LauncherConfig, ProcessSource};
use crate::error::{LaunchError, Result};

/// Longest command name the kernel records for a process (`TASK_COMM_LEN - 1`).
pub const COMM_MAX_LEN: usize = 15;

/// Source of `{pid, command name}` pairs for the running system.
pub trait ProcessFinder {
    /// Returns the IDs of every process whose command name equals `name`
    /// exactly.  An empty list means "not running"; an error means the
    /// process table could not be read at all.
    fn find_by_name(&mut self, name: &str) -> Result<Vec<u32>>;
}

/// Reduces a configured binary (possibly a path) to the name the kernel
/// records for it: the basename, cut to [`COMM_MAX_LEN`] bytes.
pub fn comm_name(binary: &str) -> &str {
    let base = binary.rsplit('/').next().unwrap_or(binary);
    if base.len() <= COMM_MAX_LEN {
        return base;
    }
    let mut end = COMM_MAX_LEN;
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    &base[..end]
}

/// Process lookup through the `sysinfo` crate.
pub struct SysinfoFinder {
    sys: System,
}

impl SysinfoFinder {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SysinfoFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessFinder for SysinfoFinder {
    fn find_by_name(&mut self, name: &str) -> Result<Vec<u32>> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);

        // A live system always lists at least this process.
        if self.sys.processes().is_empty() {
            return Err(LaunchError::ProcessTableUnavailable(
                "sysinfo returned an empty process list".to_string(),
            ));
        }

        let target = comm_name(name);
        let mut pids: Vec<u32> = self
            .sys
            .processes()
            .iter()
            .filter(|(_, p)| p.name() == target)
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }
}

/// Process lookup through the `procfs` crate, rooted at a configurable
/// mount point.
///
/// Entries whose name is not purely numeric are not processes and are
/// skipped.  A process that exits between the directory scan and the `stat`
/// read is skipped as well.
pub struct ProcfsFinder {
    root: PathBuf,
}

impl ProcfsFinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessFinder for ProcfsFinder {
    fn find_by_name(&mut self, name: &str) -> Result<Vec<u32>> {
        let processes = all_processes_with_root(&self.root).map_err(|e| {
            LaunchError::ProcessTableUnavailable(format!("{}: {e}", self.root.display()))
        })?;

        let target = comm_name(name);
        let mut pids = Vec::new();

        for process in processes {
            let Ok(process) = process else { continue };
            let stat = match process.stat() {
                Ok(stat) => stat,
                Err(e) => {
                    debug!("Skipping pid {}: {e}", process.pid);
                    continue;
                }
            };
            if stat.comm == target {
                if let Ok(pid) = u32::try_from(stat.pid) {
                    pids.push(pid);
                }
            }
        }

        pids.sort_unstable();
        Ok(pids)
    }
}

/// Creates the finder selected by `process_source`.
pub fn create_finder(config: &LauncherConfig) -> Box<dyn ProcessFinder> {
    match config.process_source {
        ProcessSource::Sysinfo => Box::new(SysinfoFinder::new()),
        ProcessSource::Procfs => Box::new(ProcfsFinder::new(&config.proc_root)),
    }
}

/// Builds a fake procfs tree with one `<pid>/{comm,stat}` pair per entry.
#[cfg(test)]
pub(crate) fn fake_proc(entries: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (pid, comm) in entries {
        let proc_dir = dir.path().join(pid);
        std::fs::create_dir(&proc_dir).unwrap();
        std::fs::write(proc_dir.join("comm"), format!("{comm}\n")).unwrap();
        std::fs::write(
            proc_dir.join("stat"),
            format!(
                "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194304 79 0 0 0 0 0 0 0 20 0 1 0 \
                 94291 2703360 286 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 \
                 0 0 0 0 0 0 0 0 0 0\n"
            ),
        )
        .unwrap();
    }
    dir
}
