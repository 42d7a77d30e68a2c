//! Validate command - Check the CSV host registry.

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use invgen_core::{CsvSource, InventoryConfig, RowSource, RowValidation, RowValidator};

use super::OutputFormat;

#[derive(Args)]
pub struct ValidateArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn execute(args: ValidateArgs, config: InventoryConfig) -> Result<()> {
    let source = CsvSource::from_config(&config);
    info!("Validating {}", source.describe());

    let rows = source
        .load_rows()
        .with_context(|| format!("Failed to read {}", source.describe()))?;
    let validation = RowValidator::validate_rows(&rows, &config);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&validation)?),
        OutputFormat::Text => print_text(&validation),
    }

    if !validation.result.valid {
        bail!(
            "Validation failed: {} of {} rows invalid",
            validation.invalid_rows(),
            validation.total_rows
        );
    }
    Ok(())
}

fn print_text(validation: &RowValidation) {
    println!("📋 Validating host rows...");
    println!(
        "   {} rows, {} valid, {} invalid",
        validation.total_rows,
        validation.valid_rows(),
        validation.invalid_rows()
    );

    if validation.result.valid {
        println!("   ✅ All rows passed validation");
    } else {
        println!("   ❌ Invalid rows:");
        for error in &validation.result.errors {
            println!("      - {}", error);
        }
    }

    for warning in &validation.result.warnings {
        println!("   ⚠️  {}", warning);
    }
}
