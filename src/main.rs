use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simstar::ingestion::{ParquetTableWriter, RunDirectoryReader};
use simstar::star_schema::energy_summary;
use simstar::{Pipeline, PipelineConfig, PipelineOutcome};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simstar")]
#[command(about = "Star-schema ETL and validation for building energy simulation runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and validate the star schema, print the report
    Validate {
        /// Directory holding run_* sub-directories
        #[arg(short, long, default_value = "data/simulations")]
        simulations: PathBuf,

        /// JSON pipeline configuration (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate, then write Parquet tables unless the report is fatal
    Run {
        #[arg(short, long, default_value = "data/simulations")]
        simulations: PathBuf,

        /// Output directory for Parquet files and the report
        #[arg(short, long, default_value = "data/warehouse")]
        output: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Load without running the validation rules
        #[arg(long)]
        skip_validation: bool,
    },

    /// Print table row counts and the per-run energy summary
    Summary {
        #[arg(short, long, default_value = "data/simulations")]
        simulations: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Validate {
            simulations,
            config,
        } => {
            let outcome = run_pipeline(&simulations, config.as_deref(), false)?;
            println!("{}", outcome.report);
            outcome.report.exit_code()
        }
        Commands::Run {
            simulations,
            output,
            config,
            skip_validation,
        } => {
            let outcome = run_pipeline(&simulations, config.as_deref(), skip_validation)?;
            println!("{}", outcome.report);
            let writer = ParquetTableWriter::new(&output);
            writer.write_report(&outcome.report)?;
            match (&outcome.star_schema, outcome.should_load()) {
                (Some(schema), true) => {
                    let mut frames = schema.to_frames()?;
                    let written = writer.write_frames(&mut frames)?;
                    info!("Loaded {} tables into {}", written.len(), output.display());
                }
                _ => error!("Report is fatal, nothing loaded"),
            }
            outcome.report.exit_code()
        }
        Commands::Summary {
            simulations,
            config,
        } => {
            let outcome = run_pipeline(&simulations, config.as_deref(), true)?;
            match &outcome.star_schema {
                Some(schema) => {
                    println!("{}", "=".repeat(80));
                    println!("TABLES");
                    println!("{}", "=".repeat(80));
                    for (table, rows) in schema.table_row_counts() {
                        println!("{:<24} {:>10}", table, rows);
                    }
                    let frames = schema.to_frames()?;
                    if let Some(meters) = frames.get("fact_meters") {
                        println!("{}", "=".repeat(80));
                        println!("ENERGY SUMMARY");
                        println!("{}", "=".repeat(80));
                        for row in energy_summary(meters, &schema.dimensions)? {
                            println!("{}", row);
                        }
                    }
                }
                None => println!("{}", outcome.report),
            }
            outcome.report.exit_code()
        }
    };

    std::process::exit(exit_code);
}

fn run_pipeline(
    simulations: &Path,
    config_path: Option<&Path>,
    skip_validation: bool,
) -> Result<PipelineOutcome> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.skip_validation |= skip_validation;

    let batch = RunDirectoryReader::new(simulations)
        .read_batch()
        .with_context(|| format!("reading simulations from {}", simulations.display()))?;
    Ok(Pipeline::new(config).run(batch))
}
