//! Command-line interface for the bathymetry pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{OutlierPolicy, TideFormat};
use crate::core::loaders;
use crate::core::types::VerticalDatumSet;
use crate::core::writers;
use crate::processors::cleaning;
use crate::processors::filtering;
use crate::processors::pipeline::{run_pipeline, PipelineError, PipelineInputs, PipelineOptions};
use crate::PipelineConfig;

/// Number of outliers shown before the remove/keep decision.
const OUTLIER_PREVIEW: usize = 10;

#[derive(Parser)]
#[command(name = "sbes-pipeline")]
#[command(about = "Single-beam echosounder bathymetry processing pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, tide-correct and project soundings, writing one XYZ file per zone and datum
    Process {
        /// Sounding files (tab-delimited), concatenated in the order given
        #[arg(short, long, num_args = 1.., required = true)]
        soundings: Vec<PathBuf>,
        /// Tide gauge file
        #[arg(short, long)]
        tide: PathBuf,
        /// Datum file with HWS, MSL and LWS columns
        #[arg(short, long)]
        datum: Option<PathBuf>,
        /// High water surface level (used with --msl and --lws instead of a datum file)
        #[arg(long)]
        hws: Option<f64>,
        /// Mean sea level
        #[arg(long)]
        msl: Option<f64>,
        /// Low water surface level
        #[arg(long)]
        lws: Option<f64>,
        /// Output directory for XYZ files
        #[arg(short, long)]
        output_dir: PathBuf,
        /// What to do with IQR outliers
        #[arg(long, value_enum)]
        outliers: Option<OutlierPolicy>,
        /// Tide file layout
        #[arg(long, value_enum)]
        tide_format: Option<TideFormat>,
        /// chrono pattern for sounding date and time columns
        #[arg(long)]
        date_format: Option<String>,
        /// chrono pattern for tide timestamps
        #[arg(long)]
        tide_date_format: Option<String>,
        /// Drop failing UTM zones instead of aborting
        #[arg(long)]
        isolate_zone_failures: bool,
        /// Also write the full corrected table as CSV
        #[arg(long)]
        table: bool,
    },

    /// Report the IQR fence and preview outliers without writing anything
    Outliers {
        /// Sounding files (tab-delimited)
        #[arg(short, long, num_args = 1.., required = true)]
        soundings: Vec<PathBuf>,
        /// chrono pattern for sounding date and time columns
        #[arg(long)]
        date_format: Option<String>,
        /// IQR multiplier for the fence
        #[arg(long)]
        fence_multiplier: Option<f64>,
    },

    /// Write the effective configuration as YAML
    InitConfig {
        /// Output YAML path
        #[arg(default_value = "sbes-pipeline.yaml")]
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            format!("{}...", value.chars().take(34).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Process {
            soundings,
            tide,
            datum,
            hws,
            msl,
            lws,
            output_dir,
            outliers,
            tide_format,
            date_format,
            tide_date_format,
            isolate_zone_failures,
            table,
        } => {
            let mut config = config;
            if let Some(policy) = outliers {
                config.outliers.policy = policy;
            }
            if let Some(format) = tide_format {
                config.input.tide_format = format;
            }
            if let Some(format) = date_format {
                config.input.sounding_datetime_format = format;
            }
            if let Some(format) = tide_date_format {
                config.input.tide_datetime_format = format;
            }
            if isolate_zone_failures {
                config.projection.isolate_zone_failures = true;
            }
            if hws.is_some() || msl.is_some() || lws.is_some() {
                config.datum.hws = hws;
                config.datum.msl = msl;
                config.datum.lws = lws;
            }
            cmd_process(&soundings, &tide, datum.as_deref(), &output_dir, table, &config);
        }
        Commands::Outliers {
            soundings,
            date_format,
            fence_multiplier,
        } => {
            let mut config = config;
            if let Some(format) = date_format {
                config.input.sounding_datetime_format = format;
            }
            if let Some(k) = fence_multiplier {
                config.outliers.fence_multiplier = k;
            }
            cmd_outliers(&soundings, &config);
        }
        Commands::InitConfig { output } => {
            cmd_init_config(&output, &config);
        }
    }
}

/// Pick the datum from a file, falling back to manually supplied levels.
fn resolve_datum(
    datum_file: Option<&Path>,
    config: &PipelineConfig,
) -> Result<VerticalDatumSet, PipelineError> {
    if let Some(path) = datum_file {
        return Ok(loaders::load_datum_file(path)?);
    }

    let manual = &config.datum;
    if manual.hws.is_none() && manual.msl.is_none() && manual.lws.is_none() {
        return Err(PipelineError::Configuration(
            "a datum file or --hws, --msl and --lws is required".to_string(),
        ));
    }
    manual.to_datum_set().ok_or_else(|| {
        PipelineError::Configuration("HWS, MSL and LWS must all be given as finite numbers".to_string())
    })
}

fn process(
    soundings: &[PathBuf],
    tide: &Path,
    datum_file: Option<&Path>,
    output_dir: &Path,
    table: bool,
    config: &PipelineConfig,
) -> Result<Vec<(&'static str, String)>> {
    let datum = resolve_datum(datum_file, config)?;

    let spinner = create_spinner("Loading input files...");
    let inputs = PipelineInputs {
        soundings: loaders::load_sounding_files(soundings).context("reading sounding files")?,
        tide: loaders::load_tide_file(tide, config.input.tide_format)
            .with_context(|| format!("reading tide file {}", tide.display()))?,
        datum,
    };

    spinner.set_message("Cleaning, correcting and projecting soundings...");
    let output = run_pipeline(&inputs, &PipelineOptions::from(config));
    spinner.finish_and_clear();
    let output = output?;

    for failure in &output.zone_failures {
        warn!(
            "{} points skipped (EPSG {:?}): {}",
            failure.points, failure.epsg, failure.error
        );
    }

    let written = writers::write_partitions(
        output_dir,
        &output.partitions,
        &config.output.file_prefix,
        config.output.decimals,
    )?;

    let mut items = vec![
        ("Sounding rows", output.sounding_rows.to_string()),
        ("Rows dropped", output.soundings_dropped.rows.to_string()),
        ("Tide samples", output.tide_samples.to_string()),
        ("Tide rows dropped", output.tide_rows_dropped.to_string()),
        (
            "Datum",
            format!("HWS {:.3}, MSL {:.3}, LWS {:.3}", datum.hws, datum.msl, datum.lws),
        ),
        ("IQR fence", format!("[{:.3}, {:.3}]", output.fence.lower, output.fence.upper)),
        ("Outliers", output.outliers.to_string()),
        ("Outlier action", output.outlier_action.as_str().to_string()),
        ("Points written", output.points.len().to_string()),
        ("Tide extrapolated", output.tide_out_of_range.to_string()),
        ("UTM zones", output.zone_labels.join(", ")),
        ("Files written", written.len().to_string()),
        ("Output directory", output_dir.display().to_string()),
    ];

    if table {
        let table_path = output_dir.join(format!("{}_corrected.csv", config.output.file_prefix));
        writers::write_corrected_table(&table_path, &output.points)?;
        items.push(("Corrected table", table_path.display().to_string()));
    }

    Ok(items)
}

fn cmd_process(
    soundings: &[PathBuf],
    tide: &Path,
    datum_file: Option<&Path>,
    output_dir: &Path,
    table: bool,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    match process(soundings, tide, datum_file, output_dir, table, config) {
        Ok(mut items) => {
            items.push(("Duration", format!("{:.2?}", start.elapsed())));
            print_summary("Bathymetry Processing Complete", &items);
        }
        Err(e) => {
            error!("Processing failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_outliers(soundings: &[PathBuf], config: &PipelineConfig) {
    let start = Instant::now();

    let rows = match loaders::load_sounding_files(soundings) {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to load sounding files: {}", e);
            std::process::exit(1);
        }
    };

    let cleaned = match cleaning::clean_soundings(&rows, &config.input.sounding_datetime_format) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            error!("Cleaning failed: {}", e);
            std::process::exit(1);
        }
    };

    let report = match filtering::detect_outliers(&cleaned.points, config.outliers.fence_multiplier) {
        Ok(report) => report,
        Err(e) => {
            error!("Outlier detection failed: {}", e);
            std::process::exit(1);
        }
    };

    if report.outlier_count() > 0 {
        println!("First {} outliers:", OUTLIER_PREVIEW.min(report.outlier_count()));
        println!("{:<20} {:>14} {:>14} {:>10}", "timestamp", "longitude", "latitude", "depth");
        for p in report.preview(&cleaned.points, OUTLIER_PREVIEW) {
            println!(
                "{:<20} {:>14.6} {:>14.6} {:>10.3}",
                p.timestamp.format("%Y-%m-%d %H:%M:%S"),
                p.longitude,
                p.latitude,
                p.depth
            );
        }
    } else {
        println!("No outliers found by the IQR method.");
    }

    print_summary(
        "Outlier Detection Complete",
        &[
            ("Sounding rows", cleaned.points.len().to_string()),
            ("Rows dropped", cleaned.dropped.rows.to_string()),
            ("Q1", format!("{:.3}", report.fence.q1)),
            ("Q3", format!("{:.3}", report.fence.q3)),
            ("IQR", format!("{:.3}", report.fence.iqr)),
            ("Fence", format!("[{:.3}, {:.3}]", report.fence.lower, report.fence.upper)),
            ("Outliers", report.outlier_count().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_init_config(output: &Path, config: &PipelineConfig) {
    match config.to_yaml(output) {
        Ok(()) => println!("Wrote configuration to {}", output.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", output.display(), e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_command() {
        let cli = Cli::try_parse_from([
            "sbes-pipeline",
            "-v",
            "process",
            "-s",
            "a.txt",
            "b.txt",
            "-t",
            "pasut.txt",
            "--hws",
            "2.9",
            "--msl",
            "1.59",
            "--lws",
            "0.27",
            "-o",
            "out",
            "--outliers",
            "keep",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Process {
                soundings,
                outliers,
                hws,
                datum,
                ..
            } => {
                assert_eq!(soundings.len(), 2);
                assert_eq!(outliers, Some(OutlierPolicy::Keep));
                assert_eq!(hws, Some(2.9));
                assert!(datum.is_none());
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_resolve_datum_requires_source() {
        let config = PipelineConfig::default();
        assert!(matches!(
            resolve_datum(None, &config),
            Err(PipelineError::Configuration(_))
        ));

        let mut partial = PipelineConfig::default();
        partial.datum.hws = Some(2.9);
        assert!(matches!(
            resolve_datum(None, &partial),
            Err(PipelineError::Configuration(_))
        ));

        let mut manual = PipelineConfig::default();
        manual.datum.hws = Some(2.9);
        manual.datum.msl = Some(1.59);
        manual.datum.lws = Some(0.27);
        assert_eq!(resolve_datum(None, &manual).unwrap().msl, 1.59);
    }
}
