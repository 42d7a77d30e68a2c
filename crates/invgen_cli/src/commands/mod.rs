//! CLI command definitions.
//!
//! Global flags select the configuration file and the host source; each
//! subcommand receives the fully resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use invgen_core::{InventoryConfig, DEFAULT_CONFIG_FILE};

pub mod generate;
pub mod validate;

/// invgen - Ansible inventory generator
#[derive(Parser)]
#[command(name = "invgen")]
#[command(version, about = "invgen - Generate Ansible inventories from a CSV host registry")]
#[command(long_about = r#"
invgen turns a CSV host registry into an Ansible inventory: one inventory file
per environment and one host_vars file per active host. Files whose content
has not changed are left untouched.

COMMANDS:
  generate  → Build inventory and host_vars files
  validate  → Check every CSV row without writing anything

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or missing source
  3 - Validation failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// CSV host registry (overrides data.csv_file and INVENTORY_CSV_FILE)
    #[arg(long, global = true)]
    pub csv_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate inventory and host_vars files
    Generate(generate::GenerateArgs),

    /// Validate the CSV host registry
    Validate(validate::ValidateArgs),
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Load the configuration file and apply environment and flag overrides.
    pub fn load_config(&self) -> Result<InventoryConfig> {
        let mut config = InventoryConfig::load(&self.config)
            .with_context(|| format!("Failed to load configuration from {:?}", self.config))?
            .with_env_overrides();

        if let Some(csv_file) = &self.csv_file {
            config.data.csv_file = csv_file.clone();
        }
        Ok(config)
    }

    /// Log level in effect while the configuration is still being read.
    pub fn bootstrap_log_level(&self, env_level: Option<String>) -> String {
        if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "warn".to_string()
        } else {
            env_level
                .filter(|level| !level.trim().is_empty())
                .map(|level| level.to_lowercase())
                .unwrap_or_else(|| "info".to_string())
        }
    }

    /// Log level from the flags, falling back to the configured level.
    pub fn log_level(&self, config: &InventoryConfig) -> String {
        self.bootstrap_log_level(Some(config.logging.level.clone()))
    }
}
