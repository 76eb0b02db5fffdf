#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CLI entry point for the MTR-TPU spatial analysis toolchain.
//!
//! `run` executes the full multi-year batch; `join` does a single year;
//! `stations` and `boundaries` validate the input files without running
//! any analysis. Exit code is 0 on success (skipped years are success),
//! non-zero on fatal configuration, station, or output errors.

mod progress;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mtr_tpu_classify::ProximityConfig;
use mtr_tpu_loader::{boundaries, paths, stations};
use mtr_tpu_models::CensusYear;
use mtr_tpu_pipeline::{RunOptions, run_batch};

use crate::progress::IndicatifProgress;

#[derive(Parser)]
#[command(name = "mtr-tpu", about = "MTR-TPU spatial analysis toolchain")]
struct Cli {
    /// Project data directory (inputs under `raw/` and `processed/`,
    /// results under `analysis/`).
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for every requested census year
    Run {
        /// Comma-separated census years (default: 2001,2006,2011,2016,2021)
        #[arg(long)]
        years: Option<String>,
        /// Station CSV path (default: `<data-dir>/raw/mtr/mtr_stations.csv`)
        #[arg(long)]
        stations: Option<PathBuf>,
        /// Output directory (default: `<data-dir>/analysis`)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// TOML file with `[proximity]` thresholds
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the pipeline for a single census year
    Join {
        /// Census year (e.g. 2016)
        year: CensusYear,
        /// Station CSV path (default: `<data-dir>/raw/mtr/mtr_stations.csv`)
        #[arg(long)]
        stations: Option<PathBuf>,
        /// Output directory (default: `<data-dir>/analysis`)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// TOML file with `[proximity]` thresholds
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load and summarize the station file
    Stations {
        /// Station CSV path (default: `<data-dir>/raw/mtr/mtr_stations.csv`)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Load and summarize one census year's boundary file
    Boundaries {
        /// Census year (e.g. 2016)
        year: CensusYear,
        /// Boundary GeoJSON path (default:
        /// `<data-dir>/processed/tpu/tpu_boundaries_<year>_processed.geojson`)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

/// Parses a comma-separated year list, falling back to the default
/// census years.
fn resolve_years(years: Option<&str>) -> Result<Vec<CensusYear>, Box<dyn std::error::Error>> {
    years.map_or_else(
        || Ok(CensusYear::DEFAULT_YEARS.to_vec()),
        |list| {
            list.split(',')
                .map(|y| y.parse::<CensusYear>().map_err(Into::into))
                .collect()
        },
    )
}

/// Builds run options from CLI arguments.
fn build_options(
    data_dir: &std::path::Path,
    years: Vec<CensusYear>,
    stations: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<RunOptions, Box<dyn std::error::Error>> {
    let mut options = RunOptions::for_data_dir(data_dir);
    options.years = years;
    if let Some(stations) = stations {
        options.stations_path = stations;
    }
    if let Some(out_dir) = out_dir {
        options.out_dir = out_dir;
    }
    if let Some(config) = config {
        options.config = ProximityConfig::from_file(&config)?;
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            years,
            stations,
            out_dir,
            config,
        } => {
            let years = resolve_years(years.as_deref())?;
            let options = build_options(&cli.data_dir, years, stations, out_dir, config)?;

            #[allow(clippy::cast_possible_truncation)]
            let bar = IndicatifProgress::steps_bar(&multi, "Years", options.years.len() as u64);
            run_batch(options, &bar).await?;
        }
        Commands::Join {
            year,
            stations,
            out_dir,
            config,
        } => {
            let options = build_options(&cli.data_dir, vec![year], stations, out_dir, config)?;

            let bar = IndicatifProgress::steps_bar(&multi, "Years", 1);
            run_batch(options, &bar).await?;
        }
        Commands::Stations { file } => {
            let path = file.unwrap_or_else(|| paths::stations_csv(&cli.data_dir));
            let stations = stations::load_stations(&path)?;

            let mut by_line: BTreeMap<String, usize> = BTreeMap::new();
            for station in &stations {
                let line = station.line.clone().unwrap_or_else(|| "(unknown)".to_owned());
                *by_line.entry(line).or_default() += 1;
            }

            println!("{} stations in {}", stations.len(), path.display());
            for (line, count) in by_line {
                println!("  {line}: {count}");
            }
        }
        Commands::Boundaries { year, file } => {
            let path = file.unwrap_or_else(|| paths::boundaries_geojson(&cli.data_dir, year));
            let boundaries = boundaries::load_boundaries(&path, year)?;

            let named = boundaries.iter().filter(|b| b.name.is_some()).count();
            println!(
                "{} TPU boundaries for {year} in {} ({named} with names)",
                boundaries.len(),
                path.display()
            );
        }
    }

    Ok(())
}
