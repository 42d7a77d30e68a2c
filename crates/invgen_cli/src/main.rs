//! invgen CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or missing source
//! - 3: Validation failure

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use invgen_core::{config::ENV_LOG_LEVEL, InventoryError};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

fn run(cli: Cli) -> anyhow::Result<()> {
    // Logging must be live before the configuration is read so its warnings show.
    let log_handle = init_logging(&cli.bootstrap_log_level(std::env::var(ENV_LOG_LEVEL).ok()));

    let config = cli.load_config()?;
    if let Some(handle) = &log_handle {
        set_log_level(handle, &cli.log_level(&config));
    }
    debug!("Using configuration {:?}", cli.config);

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, config),
        Commands::Validate(args) => commands::validate::execute(args, config),
    }
}

/// Filter for `level`. `RUST_LOG` takes precedence when set.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the fmt subscriber with a reloadable filter.
///
/// Returns `None` when a subscriber was already installed.
fn init_logging(level: &str) -> Option<LogHandle> {
    let (filter, handle) = reload::Layer::new(log_filter(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .ok()
        .map(|()| handle)
}

fn set_log_level(handle: &LogHandle, level: &str) {
    if let Err(e) = handle.reload(log_filter(level)) {
        warn!("Could not apply log level {}: {}", level, e);
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<InventoryError>() {
        return match err {
            InventoryError::SourceNotFound(_)
            | InventoryError::MissingColumns(_)
            | InventoryError::InvalidConfig { .. } => ExitCodes::INVALID_ARGS,
            InventoryError::InvalidHost(_) | InventoryError::NoValidHosts(_) => {
                ExitCodes::VALIDATION_FAILURE
            }
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("validation") || msg.contains("no valid hosts") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("not found") || msg.contains("missing required") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
