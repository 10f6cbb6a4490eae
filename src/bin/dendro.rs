//! dendro CLI - turns tree, street and air-quality spreadsheets into SQL inserts
//!
//! Sources and options come from `dendro.yaml`; flags override them.

use clap::{Args, Parser, Subcommand};
use dendro::{DryRunSink, ErrorPolicy, Extraction, ImportConfig, Pipeline, RunReport, Sources};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dendro")]
#[command(version, about = "Normalize tree and air-quality spreadsheets into SQL insert batches", long_about = None)]
struct Cli {
    /// Path to the import configuration
    #[arg(short, long, global = true, default_value = "dendro.yaml")]
    config: PathBuf,

    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Source overrides
#[derive(Args)]
struct SourceArgs {
    /// Pollution workbook (one sheet per station)
    #[arg(long, global = true)]
    pollution: Option<PathBuf>,

    /// Timeseries CSV export; repeat for several files
    #[arg(long, global = true)]
    timeseries: Vec<PathBuf>,

    /// Species catalog CSV
    #[arg(long, global = true)]
    tree_types: Option<PathBuf>,

    /// Trees workbook (addresses and trees on the first sheet)
    #[arg(long, global = true)]
    trees: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write statement files, one per batch
    Export {
        /// Output directory (default: output_dir from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write every batch, in order, to import_data.sql
        #[arg(long)]
        combined: bool,

        /// Also write normalized records and skipped rows as NDJSON
        #[arg(long)]
        records: bool,
    },

    /// Read every source and dry-run the load without a database
    Check,

    /// Apply every batch to the database (requires the `mysql` feature)
    Load {
        /// Database URL (overrides DATABASE_URL and the config)
        #[arg(long)]
        database_url: Option<String>,

        /// What to do when a statement fails
        #[arg(long, value_enum)]
        on_error: Option<ErrorPolicy>,
    },

    /// Delete every imported row (requires the `mysql` feature)
    Purge {
        /// Database URL (overrides DATABASE_URL and the config)
        #[arg(long)]
        database_url: Option<String>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Export {
            output,
            combined,
            records,
        } => export(&config, output, combined, records),
        Commands::Check => check(&config),
        Commands::Load {
            database_url,
            on_error,
        } => load(config, database_url, on_error),
        Commands::Purge { database_url } => purge(config, database_url),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Config file (optional when left at its default path), then environment,
/// then flags.
fn load_config(cli: &Cli) -> Result<ImportConfig, String> {
    let mut config = if cli.config.exists() {
        ImportConfig::load_from_file(&cli.config).map_err(|e| e.to_string())?
    } else if cli.config == PathBuf::from("dendro.yaml") {
        tracing::debug!("No dendro.yaml found, using defaults");
        ImportConfig::default()
    } else {
        return Err(format!("Config file not found: {}", cli.config.display()));
    };
    config = config.with_env();

    let args = &cli.sources;
    if let Some(path) = &args.pollution {
        config.sources.pollution_workbook = Some(path.clone());
    }
    if !args.timeseries.is_empty() {
        config.sources.timeseries = args.timeseries.clone();
    }
    if let Some(path) = &args.tree_types {
        config.sources.tree_types = Some(path.clone());
    }
    if let Some(path) = &args.trees {
        config.sources.trees_workbook = Some(path.clone());
    }

    Ok(config)
}

fn extract(config: &ImportConfig) -> Result<(Pipeline, Extraction), String> {
    let sources = Sources::open(&config.sources).map_err(|e| e.to_string())?;
    let pipeline = Pipeline::from_config(config);
    let extraction = pipeline.extract(&sources).map_err(|e| e.to_string())?;
    Ok((pipeline, extraction))
}

fn export(
    config: &ImportConfig,
    output: Option<PathBuf>,
    combined: bool,
    records: bool,
) -> Result<(), String> {
    let (pipeline, extraction) = extract(config)?;
    let dir = output.unwrap_or_else(|| config.output_dir.clone());

    let written = pipeline
        .export(&extraction, &dir, combined)
        .map_err(|e| format!("Failed to write statements: {}", e))?;
    println!("Wrote {} statement files to {}", written.len(), dir.display());

    if records {
        let written = pipeline
            .export_records(&extraction, &dir)
            .map_err(|e| format!("Failed to write records: {}", e))?;
        println!("Wrote {} record files to {}", written.len(), dir.display());
    }

    print_skipped(&extraction);
    Ok(())
}

fn check(config: &ImportConfig) -> Result<(), String> {
    let (pipeline, extraction) = extract(config)?;
    let mut sink = DryRunSink::new();

    let run = pipeline
        .load(&extraction, &mut sink, ErrorPolicy::Continue)
        .map_err(|e| e.to_string())?;

    print_run(&run);
    print_skipped(&extraction);
    Ok(())
}

#[cfg(feature = "mysql")]
fn connect(config: &ImportConfig, database_url: Option<String>) -> Result<dendro::Database, String> {
    let url = database_url
        .or_else(|| config.database.url.clone())
        .ok_or_else(|| "No database URL: set DATABASE_URL or database.url".to_string())?;
    let db = dendro::Database::new(&url, &config.database).map_err(|e| e.to_string())?;
    db.test_connection().map_err(|e| e.to_string())?;
    Ok(db)
}

#[cfg(feature = "mysql")]
fn load(
    config: ImportConfig,
    database_url: Option<String>,
    on_error: Option<ErrorPolicy>,
) -> Result<(), String> {
    let (pipeline, extraction) = extract(&config)?;
    let db = connect(&config, database_url)?;
    let mut sink = db.sink().map_err(|e| e.to_string())?;

    let run = pipeline
        .load(&extraction, &mut sink, on_error.unwrap_or(config.on_error))
        .map_err(|e| e.to_string())?;

    print_run(&run);
    print_skipped(&extraction);
    if run.aborted {
        return Err("Load aborted after a failed statement".to_string());
    }
    Ok(())
}

#[cfg(feature = "mysql")]
fn purge(config: ImportConfig, database_url: Option<String>) -> Result<(), String> {
    let db = connect(&config, database_url)?;
    let schema = dendro::Schema::new(config.schema.clone());

    for (table, rows) in db.purge(&schema).map_err(|e| e.to_string())? {
        println!("  {}: {} rows deleted", table, rows);
    }
    Ok(())
}

#[cfg(not(feature = "mysql"))]
fn load(
    _config: ImportConfig,
    _database_url: Option<String>,
    _on_error: Option<ErrorPolicy>,
) -> Result<(), String> {
    Err("dendro was built without the `mysql` feature".to_string())
}

#[cfg(not(feature = "mysql"))]
fn purge(_config: ImportConfig, _database_url: Option<String>) -> Result<(), String> {
    Err("dendro was built without the `mysql` feature".to_string())
}

fn print_run(run: &RunReport) {
    for batch in &run.batches {
        println!(
            "  {}: {} applied, {} failed, {} unresolved references",
            batch.domain,
            batch.applied,
            batch.failures.len(),
            batch.unresolved
        );
    }
    println!(
        "{} units applied, {} failed, {} ids registered",
        run.applied(),
        run.failed(),
        run.registered
    );
}

fn print_skipped(extraction: &Extraction) {
    let skipped = extraction.skipped();
    if skipped.is_empty() {
        return;
    }
    println!("{} rows skipped:", skipped.len());
    for row in skipped {
        println!("  {}", row);
    }
}
