use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};

use actkbd_launcher::config::{self, Config};
use actkbd_launcher::controller::{LaunchController, LaunchOutcome};
use actkbd_launcher::device_list::{DirectoryLister, EntryKind};
use actkbd_launcher::options::LaunchOptions;
use actkbd_launcher::process_finder::create_finder;
use actkbd_launcher::ring_log::RingLog;
use actkbd_launcher::runner::create_runner;
use actkbd_launcher::status::{self, LauncherStatus};
use actkbd_launcher::{paths, startup};

#[derive(Parser, Debug)]
#[command(name = "actkbd-launcher", version)]
#[command(about = "Configures and launches the actkbd keyboard daemon")]
struct Cli {
    /// Launcher settings file (default: $XDG_CONFIG_HOME/actkbd-launcher/config.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start actkbd unless an instance is already running
    Run(RunArgs),
    /// List the devices in the device directory
    Devices {
        /// Select the device at this index for later runs
        #[arg(long)]
        select: Option<usize>,
    },
    /// Print the IDs of processes named exactly NAME
    Pidof { name: String },
    /// Print the application log
    Log,
    /// Remove a device's entries from the startup script
    Forget {
        /// Device name (default: the configured device)
        #[arg(long)]
        device: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// actkbd configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Device name inside the device directory
    #[arg(short, long)]
    device: Option<String>,
    /// Grab the device
    #[arg(long)]
    grab: bool,
    /// Suppress all console messages
    #[arg(long)]
    quiet: bool,
    /// Show executed commands
    #[arg(long)]
    show_exec: bool,
    /// Show key presses
    #[arg(long)]
    show_key: bool,
    /// Use syslog for logging
    #[arg(long)]
    syslog: bool,
    /// Add the launch to the startup script
    #[arg(long)]
    permanent: bool,
    /// Print the commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

impl RunArgs {
    /// Layers the command-line flags over the configured defaults.
    fn apply(&self, mut options: LaunchOptions) -> LaunchOptions {
        if let Some(config) = &self.config {
            options.config_file = config.clone();
        }
        if let Some(device) = &self.device {
            options.device = Some(device.clone());
        }
        options.grab |= self.grab;
        options.quiet |= self.quiet;
        options.show_exec |= self.show_exec;
        options.show_key |= self.show_key;
        options.syslog |= self.syslog;
        options.permanent |= self.permanent;
        options
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let settings_path = match &cli.settings {
        Some(path) => Some(path.clone()),
        None => paths::config_file_path()
            .inspect_err(|e| warn!("{e}; using default settings"))
            .ok(),
    };
    let config = match &settings_path {
        Some(path) => {
            let config = config::load_or_default(path)?;
            debug!("Settings loaded from {}", path.display());
            config
        }
        None => Config::default(),
    };

    let (status_path, mut current_status) = open_status(paths::status_file_path())?;
    let mut log = current_status.restore_log(config.launcher.effective_log_capacity());

    match &cli.command {
        Command::Run(args) => run(args, &config, &mut current_status, &mut log),
        Command::Devices { select } => devices(*select, &config, &mut current_status, &mut log),
        Command::Pidof { name } => pidof(name, &config, &mut log),
        Command::Log => {
            for line in log.iter() {
                println!("{line}");
            }
        }
        Command::Forget { device } => forget(device.as_deref(), &config, &mut log),
    }

    current_status.capture_log(&log);
    if let Some(path) = &status_path {
        status::write_status(path, &current_status);
    }
    Ok(())
}

/// Loads the saved status.  Without a state directory the launcher still
/// works, keeping its status in memory for this invocation only.
fn open_status(
    path: actkbd_launcher::error::Result<PathBuf>,
) -> Result<(Option<PathBuf>, LauncherStatus)> {
    match path {
        Ok(path) => {
            let current = status::load_or_default(&path)?;
            Ok((Some(path), current))
        }
        Err(e) => {
            warn!("{e}; status will not be saved");
            Ok((None, LauncherStatus::new()))
        }
    }
}

fn run(args: &RunArgs, config: &Config, current_status: &mut LauncherStatus, log: &mut RingLog) {
    let mut options = args.apply(config.options.clone());
    if options.device().is_none() {
        options.device = selected_device(config, current_status.selected_device, log);
    }

    let mut controller = LaunchController::new(
        config.daemon.clone(),
        create_finder(&config.launcher),
        create_runner(args.dry_run),
    )
    .with_startup_script(config.launcher.startup_script.clone());

    let outcome = controller.launch(&options, log);
    if let LaunchOutcome::Launched { command, .. } = &outcome {
        current_status.record_launch(command.as_str());
    }
    current_status.state = outcome.state();
}

/// Device name at the persisted selection, if the directory can be listed.
fn selected_device(config: &Config, selected: usize, log: &mut RingLog) -> Option<String> {
    let mut lister = DirectoryLister::with_selection(selected);
    let opened = lister
        .open(Path::new(&config.daemon.device_dir), EntryKind::Symlink)
        .map(|_| ());
    let device = match opened {
        Ok(()) => lister.selected_name().map(str::to_string),
        Err(e) => {
            log.warn(e.to_string());
            None
        }
    };
    lister.close();
    device
}

fn devices(
    select: Option<usize>,
    config: &Config,
    current_status: &mut LauncherStatus,
    log: &mut RingLog,
) {
    let mut lister = DirectoryLister::with_selection(current_status.selected_device);

    if let Err(e) = lister.open(Path::new(&config.daemon.device_dir), EntryKind::Symlink) {
        log.error(e.to_string());
        return;
    }
    if let Some(index) = select {
        if !lister.select(index) {
            log.warn(format!("No device at index {index}"));
        }
    }

    for (i, name) in lister.listing().iter().enumerate() {
        let marker = if i == lister.selected_index() { '*' } else { ' ' };
        println!("{marker} [{i}] {name}");
    }
    if lister.truncated() {
        log.warn(format!("Only the first {} devices are shown", lister.len()));
    }

    current_status.selected_device = lister.selected_index();
    lister.close();
}

fn pidof(name: &str, config: &Config, log: &mut RingLog) {
    let mut finder = create_finder(&config.launcher);
    match finder.find_by_name(name) {
        Ok(pids) if pids.is_empty() => println!("{name} is not running"),
        Ok(pids) => {
            let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
            println!("{}", pids.join(" "));
        }
        Err(e) => log.error(e.to_string()),
    }
}

fn forget(device: Option<&str>, config: &Config, log: &mut RingLog) {
    let Some(device) = device.or(config.options.device()) else {
        log.warn("No device given and none configured");
        return;
    };
    let script = match &config.launcher.startup_script {
        Some(script) => script.clone(),
        None => match paths::startup_script_path() {
            Ok(script) => script,
            Err(e) => {
                log.error(e.to_string());
                return;
            }
        },
    };
    match startup::forget(&script, device) {
        Ok(0) => log.info(format!("{device} is not in {}", script.display())),
        Ok(n) => log.info(format!("Removed {n} line(s) for {device} from {}", script.display())),
        Err(e) => log.error(e.to_string()),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {level}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    info!("actkbd-launcher v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
