//! Medallion CLI - run the Bronze/Silver/Gold pipeline
//!
//! # Main Commands
//!
//! ```bash
//! medallion run                          # Full pipeline with .env / defaults
//! medallion run --source ./raw --data ./lake
//! medallion run --dry-run                # Run every stage, write nothing
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! medallion inspect orders.csv           # Show how a raw CSV is read
//! medallion check-report run_report.json # Validate a report against its schema
//! ```

use clap::{Parser, Subcommand};
use medallion::logs;
use medallion::transform::format_delimiter;
use medallion::{load_csv_file, run_pipeline, validate_run_report, PipelineOptions};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "medallion")]
#[command(about = "Turn raw e-commerce CSV exports into layered Parquet tables and metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline: CSV → Bronze → Silver → Gold → report
    Run {
        /// Directory holding the raw CSV exports
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Base directory for bronze/, silver/ and gold/
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Run report path (default: <data>/run_report.json)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// chrono format of raw timestamps
        #[arg(long)]
        timestamp_format: Option<String>,

        /// Run every stage in memory; print the report instead of writing files
        #[arg(long)]
        dry_run: bool,

        /// Log as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Load one raw CSV and show encoding, delimiter, headers and row count
    Inspect {
        /// Input CSV file
        input: PathBuf,
    },

    /// Validate a run report against the embedded schema
    CheckReport {
        /// Run report JSON file
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            source,
            data,
            report,
            timestamp_format,
            dry_run,
            json_logs,
        } => cmd_run(source, data, report, timestamp_format, dry_run, json_logs),

        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::CheckReport { input } => cmd_check_report(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    source: Option<PathBuf>,
    data: Option<PathBuf>,
    report: Option<PathBuf>,
    timestamp_format: Option<String>,
    dry_run: bool,
    json_logs: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Loads .env first, so RUST_LOG set there reaches the subscriber.
    let mut options = PipelineOptions::from_env().with_dry_run(dry_run);
    logs::init(json_logs);
    if let Some(dir) = source {
        options = options.with_source_dir(dir);
    }
    if let Some(dir) = data {
        options = options.with_data_dir(dir);
    }
    if let Some(path) = report {
        options = options.with_report_path(path);
    }
    if let Some(format) = timestamp_format {
        options = options.with_timestamp_format(format);
    }

    let run = run_pipeline(&options)?;

    if dry_run {
        println!("{}", run.report.to_json()?);
    }

    if !run.report.success {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Inspecting CSV: {}", input.display());

    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    let loaded = load_csv_file(&name, input)?;

    eprintln!("   Encoding: {}", loaded.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(loaded.delimiter));
    eprintln!("   Columns: {}", loaded.table.headers.join(", "));
    eprintln!("   Rows: {}", loaded.table.len());

    Ok(())
}

fn cmd_check_report(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Checking report: {}", input.display());

    let content = fs::read_to_string(input)?;
    let report: Value = serde_json::from_str(&content)?;

    match validate_run_report(&report) {
        Ok(()) => {
            eprintln!("   Report is valid");
            Ok(())
        }
        Err(errors) => {
            for err in errors.iter().take(10) {
                eprintln!("   - {}", err);
            }
            eprintln!("   {} schema violation(s)", errors.len());
            std::process::exit(1);
        }
    }
}
