// ABOUTME: Shared logging setup for hatch binaries
// ABOUTME: init() for interactive commands, init_file() for long-running streams, init_for() per crate

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Logging to stderr. Default: INFO (DEBUG when `verbose`), RUST_LOG override.
pub fn init(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Directory holding log files for `app_name`: ~/.config/hatch/{app_name}
pub fn log_dir(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hatch").join(app_name))
}

/// File-based logging so streamed output on stdout stays clean.
/// Default: WARN level, RUST_LOG override. Returns the log file path on success.
/// If setup fails, prints a warning to stderr and continues without logging.
pub fn init_file(app_name: &str) -> Option<PathBuf> {
    match init_file_inner(app_name) {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("Warning: failed to set up file logging: {e}");
            None
        }
    }
}

fn init_file_inner(app_name: &str) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    let log_dir = log_dir(app_name).ok_or("could not determine config directory")?;
    std::fs::create_dir_all(&log_dir)?;

    let path = log_dir.join(format!("{app_name}.log"));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_ansi(false)
        .try_init()?;

    Ok(path)
}

/// Crate-filtered logging to stderr. Default: INFO for the named crate, WARN for everything else.
pub fn init_for(crate_name: &str) {
    let directive = format!("{}=info", crate_name.replace('-', "_"));
    let filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(
            directive
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        );

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
