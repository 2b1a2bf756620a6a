/// Logging setup
///
/// The terminal UI owns stdout, so log lines go to a file instead.
use std::{
    error::Error,
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::EnvFilter;

/// Default log file, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "scalping-dashboard.log";

/// Log file path from `DASHBOARD_LOG`, or [`DEFAULT_LOG_FILE`]
pub fn log_path_from_env() -> PathBuf {
    std::env::var("DASHBOARD_LOG")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Install a global `fmt` subscriber appending to `path`, filtered by `RUST_LOG` (default
/// `info`).
pub fn init_logging(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|error| -> Box<dyn Error> { error })
}
