//! Smart Scheduler CLI - session client for the users API

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "scheduler")]
#[command(about = "Log in to Smart Scheduler and keep the session fresh")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Configuration file (TOML)
    #[arg(short = 'c', long, global = true, env = "SCHEDULER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the session file and logs
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Timeout for one-shot commands in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "30")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let component = if cli.command.is_long_running() {
        "refresher"
    } else {
        "cli"
    };
    logging::init_logging(
        cli.log_level.into(),
        cli.data_dir.clone(),
        component,
        cli.no_file_log,
    )?;

    info!("Starting Smart Scheduler CLI");

    let timeout = if cli.timeout == 0 || cli.command.is_long_running() {
        None
    } else {
        Some(Duration::from_secs(cli.timeout))
    };

    let execution = cli.command.execute(cli.config, cli.data_dir);
    let result = match timeout {
        None => execution.await,
        Some(duration) => {
            if let Ok(result) = tokio::time::timeout(duration, execution).await {
                result
            } else {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
