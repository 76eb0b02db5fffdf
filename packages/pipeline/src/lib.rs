#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Batch orchestration for the MTR-TPU spatial analysis.
//!
//! Each census year moves through load → join → classify → serialize,
//! with load allowed to exit early as a skip (missing or unreadable year
//! data never fails the batch). Years are independent, share nothing
//! mutable, and run as parallel blocking tasks; the combined file and the
//! aggregate summary are written once every year has finished.
//!
//! Error severity follows the taxonomy: bad threshold configuration
//! aborts before any year starts, a year that cannot load is skipped, a
//! degenerate polygon only flags its own record, and an empty station
//! set fails the batch because every year's output would be meaningless.

pub mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mtr_tpu_classify::{ConfigError, ProximityConfig, classify, summarize};
use mtr_tpu_loader::{LoadError, boundaries, paths, stations};
use mtr_tpu_models::{
    CensusYear, ClassifiedRecord, SkipReason, Station, YearOutcome, YearSummary,
};
use mtr_tpu_output::OutputError;
use mtr_tpu_spatial::GeometryError;
use thiserror::Error;

use crate::progress::ProgressCallback;

/// Errors that abort the batch run.
///
/// Per-year load failures and per-record geometry failures never surface
/// here; they become skip and exclude markers instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Threshold configuration is invalid (fatal before any year runs).
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The shared station file could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// The spatial join could not run at all (e.g. zero stations).
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Writing result files failed.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// A year's worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Path to the station CSV.
    pub stations_path: PathBuf,
    /// Project data directory holding per-year boundary files.
    pub data_dir: PathBuf,
    /// Directory the result CSVs are written to.
    pub out_dir: PathBuf,
    /// Census years to process.
    pub years: Vec<CensusYear>,
    /// Proximity band thresholds.
    pub config: ProximityConfig,
}

impl RunOptions {
    /// Builds options with the canonical paths under `data_dir` and the
    /// default years and thresholds.
    #[must_use]
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            stations_path: paths::stations_csv(data_dir),
            data_dir: data_dir.to_path_buf(),
            out_dir: paths::analysis_dir(data_dir),
            years: CensusYear::DEFAULT_YEARS.to_vec(),
            config: ProximityConfig::default(),
        }
    }
}

/// Report of a finished batch: one outcome per requested year, in year
/// order.
#[derive(Debug)]
pub struct BatchReport {
    /// Per-year outcomes.
    pub outcomes: Vec<YearOutcome>,
}

impl BatchReport {
    /// Summaries of the completed years, in year order.
    #[must_use]
    pub fn completed(&self) -> Vec<&YearSummary> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                YearOutcome::Completed(summary) => Some(summary),
                YearOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    /// Logs the final per-year run summary. Always emitted, so a partial
    /// result is never silent.
    pub fn log_summary(&self) {
        log::info!("Run summary:");
        for outcome in &self.outcomes {
            match outcome {
                YearOutcome::Completed(s) => {
                    log::info!(
                        "  {}: completed, {} boundaries ({} excluded), {} stations, \
                         bands {}/{}/{}/{}",
                        s.year,
                        s.boundary_count,
                        s.excluded,
                        s.station_count,
                        s.contains_station,
                        s.near,
                        s.far,
                        s.beyond
                    );
                }
                YearOutcome::Skipped { year, reason } => {
                    log::info!("  {year}: skipped ({reason})");
                }
            }
        }
    }
}

/// Runs one census year end to end against an already-loaded station
/// set: load boundaries, join, classify, serialize.
///
/// A missing or unreadable boundary file produces a
/// [`YearOutcome::Skipped`], not an error.
///
/// # Errors
///
/// Returns [`PipelineError`] only for failures that invalidate the whole
/// batch: an empty station set or an output write failure.
pub fn run_year(
    year: CensusYear,
    stations: &[Station],
    options: &RunOptions,
) -> Result<(YearOutcome, Vec<ClassifiedRecord>), PipelineError> {
    let boundary_path = paths::boundaries_geojson(&options.data_dir, year);

    log::info!("{year}: loading boundaries from {}", boundary_path.display());
    let boundaries = match boundaries::load_boundaries(&boundary_path, year) {
        Ok(boundaries) => boundaries,
        Err(LoadError::Missing { path }) => {
            log::warn!("{year}: boundary data unavailable ({}), skipping", path.display());
            return Ok((
                YearOutcome::Skipped {
                    year,
                    reason: SkipReason::Unavailable,
                },
                Vec::new(),
            ));
        }
        Err(err) => {
            log::error!("{year}: failed to load boundaries: {err}, skipping");
            return Ok((
                YearOutcome::Skipped {
                    year,
                    reason: SkipReason::LoadFailed(err.to_string()),
                },
                Vec::new(),
            ));
        }
    };

    log::info!("{year}: joining {} boundaries", boundaries.len());
    let join_records =
        mtr_tpu_spatial::join_year(&boundaries, stations, &options.config.buffer_distances)?;

    log::info!("{year}: classifying {} records", join_records.len());
    let classified = classify(join_records, &options.config);
    let summary = summarize(year, &classified, stations.len());

    mtr_tpu_output::write_year(&options.out_dir, year, &classified)?;
    log::info!("{year}: serialized");

    Ok((YearOutcome::Completed(summary), classified))
}

/// Runs the full multi-year batch.
///
/// Validates configuration up front, loads the station file once, then
/// processes every requested year in its own blocking task. Once all
/// years are done, writes the combined all-years file and the aggregate
/// summary for the completed years and logs the run summary.
///
/// # Errors
///
/// Returns [`PipelineError`] on invalid configuration, a station file
/// that cannot be loaded, an empty station set, an output failure, or a
/// panicked worker. Per-year boundary problems are reported as skips in
/// the [`BatchReport`] instead.
pub async fn run_batch(
    options: RunOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<BatchReport, PipelineError> {
    options.config.validate()?;

    let stations = Arc::new(stations::load_stations(&options.stations_path)?);
    let options = Arc::new(options);

    #[allow(clippy::cast_possible_truncation)]
    progress.set_total(options.years.len() as u64);

    let mut tasks = tokio::task::JoinSet::new();
    for year in options.years.clone() {
        let stations = Arc::clone(&stations);
        let options = Arc::clone(&options);
        tasks.spawn_blocking(move || run_year(year, &stations, &options));
    }

    let mut outcomes = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        let (outcome, _records) = joined??;
        progress.inc(1);
        progress.set_message(format!("{} done", outcome.year()));
        outcomes.push(outcome);
    }

    // Task completion order is nondeterministic; output order is not.
    outcomes.sort_by_key(YearOutcome::year);

    let report = BatchReport { outcomes };
    let summaries: Vec<YearSummary> = report.completed().into_iter().cloned().collect();

    if summaries.is_empty() {
        log::warn!("No year completed; combined and summary files not updated");
    } else {
        // The per-year files on disk are the source of truth, so the
        // combined file keeps prior years' rows across a partial rerun.
        mtr_tpu_output::write_summary(&options.out_dir, &summaries)?;
        mtr_tpu_output::write_combined(&options.out_dir)?;
    }

    progress.finish(format!(
        "{}/{} years completed",
        summaries.len(),
        options.years.len()
    ));
    report.log_summary();

    Ok(report)
}
