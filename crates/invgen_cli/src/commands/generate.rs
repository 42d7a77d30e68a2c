//! Generate command - Build inventory and host_vars files.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use invgen_core::{CsvSource, GenerationResult, InventoryConfig, InventoryKey, InventoryManager};

use super::OutputFormat;

#[derive(Args)]
pub struct GenerateArgs {
    /// Environment names or codes to generate (default: all supported)
    #[arg(short, long = "environment", value_name = "ENV")]
    pub environments: Vec<String>,

    /// Inventory output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// host_vars output directory
    #[arg(long)]
    pub host_vars_dir: Option<PathBuf>,

    /// Canonical host key: hostname or cname
    #[arg(long)]
    pub inventory_key: Option<InventoryKey>,

    /// Show what would be generated without writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl GenerateArgs {
    /// Apply directory and key overrides on top of the loaded configuration.
    fn apply(&self, config: &mut InventoryConfig) {
        if let Some(output_dir) = &self.output_dir {
            config.paths.inventory = output_dir.clone();
            config.paths.host_vars = output_dir.join("host_vars");
            config.paths.group_vars = output_dir.join("group_vars");
        }
        if let Some(host_vars_dir) = &self.host_vars_dir {
            config.paths.host_vars = host_vars_dir.clone();
        }
        if let Some(key) = self.inventory_key {
            config.hosts.inventory_key = key;
        }
    }
}

pub fn execute(args: GenerateArgs, mut config: InventoryConfig) -> Result<()> {
    args.apply(&mut config);

    info!("Generating inventory from {:?}", config.data.csv_file);
    let source = CsvSource::from_config(&config);
    let environments = (!args.environments.is_empty()).then_some(args.environments.as_slice());

    let result = InventoryManager::new(&config).generate(&source, environments, args.dry_run);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text(&result),
    }

    if !result.success {
        bail!("{}", result.error.unwrap_or_else(|| "Generation failed".to_string()));
    }
    Ok(())
}

fn print_text(result: &GenerationResult) {
    if !result.success {
        return;
    }

    if let Some(prediction) = &result.prediction {
        println!("🔍 Dry run - no files were written");
        println!("   Inventory files: {}", prediction.inventory_files.len());
        for path in &prediction.inventory_files {
            println!("      - {}", path.display());
        }
        println!("   host_vars files: {}", prediction.host_vars_files);
        println!("   Orphaned host_vars to remove: {}", prediction.orphaned_host_vars);
        println!("   Orphaned group_vars to remove: {}", prediction.orphaned_group_vars);
        for (env, counts) in &prediction.environments {
            println!(
                "   {}: {} active, {} decommissioned",
                env, counts.active, counts.decommissioned
            );
        }
    } else {
        println!("✅ Inventory generated ({} key)", result.inventory_key);
        for path in &result.generated_files {
            let marker = if result.unchanged_files.contains(path) {
                "unchanged"
            } else {
                "written"
            };
            println!("   📄 {} ({})", path.display(), marker);
        }
        println!(
            "   host_vars: {} written, {} unchanged",
            result.host_vars_written, result.host_vars_unchanged
        );
    }

    for env in &result.skipped_environments {
        println!("   ⚠️  {}: no hosts, skipped", env);
    }
    for env in &result.failed_environments {
        println!("   ❌ {}: generation failed", env);
    }

    println!();
    println!("{}", result.stats.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn args() -> GenerateArgs {
        GenerateArgs {
            environments: Vec::new(),
            output_dir: None,
            host_vars_dir: None,
            inventory_key: None,
            dry_run: false,
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn test_output_dir_moves_all_paths() {
        let mut config = InventoryConfig::default();
        let mut args = args();
        args.output_dir = Some(PathBuf::from("/tmp/out"));
        args.inventory_key = Some(InventoryKey::Cname);
        args.apply(&mut config);

        assert_eq!(config.paths.inventory, Path::new("/tmp/out"));
        assert_eq!(config.paths.host_vars, Path::new("/tmp/out/host_vars"));
        assert_eq!(config.paths.group_vars, Path::new("/tmp/out/group_vars"));
        assert_eq!(config.hosts.inventory_key, InventoryKey::Cname);
    }

    #[test]
    fn test_host_vars_dir_wins_over_output_dir() {
        let mut config = InventoryConfig::default();
        let mut args = args();
        args.output_dir = Some(PathBuf::from("out"));
        args.host_vars_dir = Some(PathBuf::from("vars"));
        args.apply(&mut config);

        assert_eq!(config.paths.host_vars, Path::new("vars"));
    }
}
