//! Collector Service - Extracts regional indicators into canonical tables
//!
//! Responsibilities:
//! - Load the indicator catalog (JSON)
//! - Run each enabled indicator's extractor, one at a time
//! - Persist one canonical CSV per indicator under the processed directory
//! - Report which indicators were saved, skipped or failed
//!
//! Usage:
//!   # Every enabled indicator:
//!   cargo run --bin collector -- --config config/indicators.json
//!
//!   # A single indicator:
//!   cargo run --bin collector -- --config config/indicators.json --indicator IPC_General
//!
//!   # Show the catalog:
//!   cargo run --bin collector -- --list

mod catalog;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use normalizer::{
    CanonicalRecord, Config, Fetch, HttpFetcher, Outcome, RegionClassifier, RegionTable, RunSummary, SourceConnector,
};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::catalog::{load_catalog, Catalog, Indicator, Request};

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Extracts regional indicators into canonical tables")]
struct Args {
    /// Path to the indicator catalog
    #[arg(long, default_value = "config/indicators.json")]
    config: PathBuf,

    /// Only run this indicator
    #[arg(long)]
    indicator: Option<String>,

    /// Print the catalog and exit
    #[arg(long, default_value = "false")]
    list: bool,

    /// Dry run - extract but don't write tables
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

/// Run the connector strategy for one catalog entry.
async fn extract<F: Fetch>(connector: &SourceConnector<F>, indicator: &Indicator) -> Outcome<Vec<CanonicalRecord>> {
    match indicator.request() {
        Request::Tempus(req) => connector.tempus(&req).await,
        Request::Matrix(req) => connector.matrix(&req).await,
        Request::Long(req) => connector.long(&req).await,
        Request::TieredMean(req) => connector.tiered_mean(&req).await,
        Request::Cumulative(req) => connector.cumulative(&req).await,
        Request::SurveyShare(req) => connector.survey_share(&req).await,
        Request::SectorShare(req) => connector.sector_share(&req).await,
        Request::Series(req) => connector.series(&req).await,
    }
}

/// Extract every selected indicator in order; failures never stop the run.
async fn run<F: Fetch>(connector: &SourceConnector<F>, indicators: &[&Indicator], dry_run: bool) -> RunSummary {
    let mut summary = RunSummary::new();

    for indicator in indicators {
        println!("\n[{}] {}", indicator.name, indicator.description);
        println!("  Provider: {}", indicator.provider);
        println!("  Strategy: {}", indicator.source.strategy());

        let outcome = extract(connector, indicator).await;
        let outcome = if dry_run {
            outcome
        } else {
            connector.save(&indicator.name, outcome)
        };

        match &outcome {
            Outcome::Ok(records) => println!("  ✓ {} records", records.len()),
            Outcome::Skipped(reason) => println!("  - Skipped: {}", reason),
            Outcome::Failed(e) => eprintln!("  ✗ Failed: {}", e),
        }
        summary.record(&indicator.name, &outcome, Vec::len);
    }

    summary
}

fn print_catalog_summary(catalog: &Catalog) {
    println!("\nConfigured indicators:");
    println!("{:-<60}", "");
    for indicator in &catalog.indicators {
        let status = if indicator.enabled { "✓" } else { "✗" };
        println!(
            "  {} {} - {} [{}]",
            status,
            indicator.name,
            indicator.provider,
            indicator.source.strategy()
        );
    }
    println!("{:-<60}", "");
}

fn print_region_table(classifier: &RegionClassifier) {
    println!("\nCanonical regions:");
    println!("{:-<60}", "");
    for code in classifier.codes() {
        println!("  {:<6} {}", code, classifier.display_name(code).unwrap_or(""));
    }
    println!("{:-<60}", "");
}

fn classifier_for(config: &Config) -> Result<RegionClassifier> {
    match &config.regions_file {
        Some(path) => {
            let table = RegionTable::from_json_file(path)
                .with_context(|| format!("Failed to load region table {}", path.display()))?;
            info!(path = %path.display(), regions = table.regions.len(), "region table loaded");
            Ok(RegionClassifier::new(&table))
        }
        None => Ok(RegionClassifier::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
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

    println!("=== Regional Indicators Collector ===");
    println!("Processed dir: {}", config.processed_dir.display());

    println!("Loading catalog from: {}", args.config.display());
    let catalog = load_catalog(&args.config)?;
    println!("Catalog version: {}", catalog.version);

    let classifier = classifier_for(&config)?;

    if args.list {
        print_catalog_summary(&catalog);
        print_region_table(&classifier);
        return Ok(());
    }

    let indicators: Vec<&Indicator> = catalog
        .indicators
        .iter()
        .filter(|i| match &args.indicator {
            Some(name) => &i.name == name,
            None => i.enabled,
        })
        .collect();

    if indicators.is_empty() {
        print_catalog_summary(&catalog);
        anyhow::bail!("No indicators match the filter criteria");
    }

    config.prepare_dirs().context("Failed to create data directories")?;
    let fetcher = HttpFetcher::from_config(&config).context("Failed to build HTTP client")?;
    let connector = SourceConnector::new(config, classifier, fetcher);

    println!("\nProcessing {} indicator(s)...", indicators.len());
    if args.dry_run {
        println!("Dry run: tables will not be written");
    }

    let summary = run(&connector, &indicators, args.dry_run).await;

    println!("\n=== Extraction Summary ===");
    println!("{}", summary);

    Ok(())
}
