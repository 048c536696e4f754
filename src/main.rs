//! CLI entry point for the EC study tool.
//!
//! Provides subcommands for building the study report, printing the merged
//! summary table, ranking schools, resolving data files by name, and
//! exporting the raw tables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ec_study::analyzers::aggregate::{environment_means, growth_means, merge_on_school};
use ec_study::analyzers::best::best_by;
use ec_study::analyzers::report::build_report;
use ec_study::analyzers::types::{Direction, SummaryColumn};
use ec_study::output::{
    GROWTH_EXPORT_NAME, environment_export_name, export_environment_csv, export_growth_xlsx,
    print_json, print_pretty, write_csv, write_report_json,
};
use ec_study::resolve::resolve;
use ec_study::{Dataset, StudyConfig};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ec_study")]
#[command(about = "Summarize plant growth against nutrient-solution EC", long_about = None)]
struct Cli {
    /// Directory holding the environment CSVs and the growth workbook
    #[arg(short, long, env = "DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// JSON study config (file names and target concentrations)
    #[arg(short, long, env = "STUDY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full study report
    Report {
        /// JSON file to write the report to (logged when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the per-school summary joined on environment and growth data
    Summary {
        /// CSV file to write the summary table to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Find the school with the best value of a summary column
    Best {
        #[arg(long, value_enum, default_value_t = SummaryColumn::FreshWeight)]
        column: SummaryColumn,

        #[arg(long, value_enum, default_value_t = Direction::Max)]
        direction: Direction,
    },
    /// Locate a data file by name, ignoring Unicode normalization differences
    Resolve {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Export one school's environment table as CSV
    ExportEnv {
        school: String,

        /// Defaults to "<school>_환경데이터.csv"
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export all growth records as a single XLSX sheet
    ExportGrowth {
        #[arg(short, long, default_value = GROWTH_EXPORT_NAME)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ec_study.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ec_study.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Report { output } => {
            let dataset = load_dataset(&cli.data_dir, &config)?;
            let report = build_report(&dataset, &config.concentrations)?;
            print_pretty(&report);

            match output {
                Some(path) => write_report_json(&path, &report)?,
                None => print_json(&report)?,
            }
        }
        Commands::Summary { output } => {
            let dataset = load_dataset(&cli.data_dir, &config)?;
            let table = merge_on_school(
                &environment_means(dataset.environment_rows())?,
                &growth_means(dataset.growth_rows())?,
                &config.concentrations,
            )?;

            for row in &table {
                info!(
                    school = %row.school,
                    target_ec = row.target_concentration,
                    fresh_weight = row.fresh_weight,
                    leaf_count = row.leaf_count,
                    shoot_length = row.shoot_length,
                    samples = row.sample_count,
                    "Summary"
                );
            }

            if let Some(path) = output {
                write_csv(&path, &table)?;
                info!(path = %path.display(), rows = table.len(), "Summary written");
            }
        }
        Commands::Best { column, direction } => {
            let dataset = load_dataset(&cli.data_dir, &config)?;
            let table = merge_on_school(
                &environment_means(dataset.environment_rows())?,
                &growth_means(dataset.growth_rows())?,
                &config.concentrations,
            )?;
            let best = best_by(&table, column, direction)?;

            info!(
                school = %best.school,
                target_ec = best.target_concentration,
                column = column.name(),
                value = best.get(column),
                ?direction,
                "Best school"
            );
        }
        Commands::Resolve { name } => {
            let path = resolve(&cli.data_dir, &name)?;
            println!("{}", path.display());
        }
        Commands::ExportEnv { school, output } => {
            let dataset = load_dataset(&cli.data_dir, &config)?;
            let rows = dataset.environment_for(&school)?;
            let output = output.unwrap_or_else(|| PathBuf::from(environment_export_name(&school)));
            export_environment_csv(&output, rows)?;
        }
        Commands::ExportGrowth { output } => {
            let dataset = load_dataset(&cli.data_dir, &config)?;
            export_growth_xlsx(&output, dataset.growth_tables())?;
        }
    }

    Ok(())
}

/// Reads the study config from `path`, or uses the built-in study.
fn load_config(path: Option<&Path>) -> Result<StudyConfig> {
    match path {
        Some(path) => StudyConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(StudyConfig::default()),
    }
}

/// Loads the dataset, warning about environment files that were not found.
#[tracing::instrument(skip(config))]
fn load_dataset(data_dir: &Path, config: &StudyConfig) -> Result<Dataset> {
    let dataset = Dataset::load(data_dir, config)
        .with_context(|| format!("cannot run without data in {}", data_dir.display()))?;

    for source in dataset.unresolved() {
        warn!(file = %source.file, school = %source.school, "Continuing without environment file");
    }

    Ok(dataset)
}
