// ABOUTME: Shared logging setup for redbot binaries
// ABOUTME: init_for() logs to stderr, init_file() appends to a file, parse_level() reads level names

use std::path::Path;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Parse a level name such as "info" or "DEBUG".
///
/// Unknown or empty names fall back to ERROR so a typo in the configured
/// level keeps the bot quiet instead of flooding the log.
pub fn parse_level(text: &str) -> Level {
    text.trim().parse().unwrap_or(Level::ERROR)
}

/// Build the filter: `level` for the named crates, WARN for everything else.
/// `RUST_LOG` directives are honored on top.
fn filter_for(crate_names: &[&str], level: Level) -> EnvFilter {
    crate_names.iter().fold(
        EnvFilter::from_default_env().add_directive(Level::WARN.into()),
        |filter, name| {
            let directive = format!("{name}={level}");
            filter.add_directive(directive.parse().unwrap_or_else(|_| level.into()))
        },
    )
}

/// Crate-filtered logging to stderr.
pub fn init_for(crate_names: &[&str], level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(crate_names, level))
        .init();
}

/// Crate-filtered logging appended to `path`.
/// If the file cannot be opened, prints a warning to stderr and logs to stderr instead.
pub fn init_file(crate_names: &[&str], level: Level, path: &Path) {
    match open_log_file(path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_env_filter(filter_for(crate_names, level))
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            eprintln!(
                "Warning: failed to open log file {}: {e}, logging to stderr",
                path.display()
            );
            init_for(crate_names, level);
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}
