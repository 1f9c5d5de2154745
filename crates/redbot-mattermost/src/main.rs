// ABOUTME: Entry point for the redbot binary.
// ABOUTME: Parses CLI flags, sets up logging, then hands off to redbot_mattermost::run.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

const LOG_CRATES: &[&str] = &["redbot", "redbot_mattermost", "redbot_redmine"];

#[derive(Parser)]
#[command(name = "redbot")]
#[command(about = "Mattermost bot that answers Redmine issue references")]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "REDBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "REDBOT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, env = "REDBOT_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = redbot_log::parse_level(&cli.log_level);
    match &cli.log_file {
        Some(path) => redbot_log::init_file(LOG_CRATES, level, path),
        None => redbot_log::init_for(LOG_CRATES, level),
    }

    redbot_mattermost::run(cli.config).await
}
