//! Consolidator Service - Builds the master table from canonical indicator tables
//!
//! Usage:
//!   # Merge every canonical table into Master_Table.csv + Results.xlsx:
//!   cargo run --bin consolidator
//!
//!   # Print the sheets of the generated workbook:
//!   cargo run --bin consolidator -- inspect

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use consolidator::workbook::inspect;
use consolidator::Consolidator;
use normalizer::Config;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "consolidator", about = "Merges canonical indicator tables into a master table")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidate the processed directory (default)
    Run,
    /// Show sheet names and sizes of a workbook
    Inspect {
        /// Workbook path (default: the processed directory's Results.xlsx)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn run(consolidator: &Consolidator) -> Result<()> {
    let report = consolidator.run().context("Consolidation failed")?;

    println!("\n=== Consolidation Summary ===");
    match report {
        Some(report) => {
            println!("Indicators: {}", report.indicators);
            println!("Rows: {}", report.rows);
            println!("Master table: {}", report.master_path.display());
            println!("Workbook: {}", report.workbook_path.display());
            if !report.skipped.is_empty() {
                println!("Skipped tables:");
                for path in &report.skipped {
                    println!("  ⚠ {}", path.display());
                }
            }
        }
        None => println!("No valid canonical tables found; master table not generated"),
    }
    Ok(())
}

fn print_inspection(path: &Path) -> Result<()> {
    let sheets = inspect(path).with_context(|| format!("Failed to open workbook {}", path.display()))?;

    println!("\nWorkbook: {}", path.display());
    println!("{:-<60}", "");
    for sheet in &sheets {
        println!("  {:<30} {:>6} rows x {:>3} columns", sheet.name, sheet.rows, sheet.columns);
    }
    println!("{:-<60}", "");
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    let consolidator = Consolidator::from_config(&config);

    println!("=== Regional Indicators Consolidator ===");
    println!("Processed dir: {}", config.processed_dir.display());

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            config.prepare_dirs().context("Failed to create data directories")?;
            run(&consolidator)
        }
        Command::Inspect { path } => print_inspection(&path.unwrap_or_else(|| consolidator.workbook_path())),
    }
}
