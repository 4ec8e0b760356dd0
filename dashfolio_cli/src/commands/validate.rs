//! The `validate` subcommand: checks a portfolio CSV against the configured
//! schema without fetching any market data.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dashfolio_lib::pipeline::{read_csv_table, validate_table};
use dashfolio_lib::DashboardConfig;

use crate::output::{print_holdings, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// YAML config holding the portfolio schema
    pub config: PathBuf,

    /// Portfolio CSV file to check
    pub csv: PathBuf,
}

pub fn run(args: &ValidateArgs, format: &OutputFormat) -> Result<()> {
    let config = DashboardConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let raw = read_csv_table(&args.csv)?;
    let (rows, warnings) = validate_table(&raw, &config.portfolio_file.schema_fields)
        .with_context(|| format!("{} does not match the schema", args.csv.display()))?;

    print_holdings(&rows, format);
    eprintln!(
        "{} holdings valid, {} optional fields missing",
        rows.len(),
        warnings.len()
    );
    Ok(())
}
