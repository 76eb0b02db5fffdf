#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CSV serialization of classified join results and year summaries.
//!
//! The per-year join files are the source of truth: each is rewritten
//! from scratch when its year runs, and the combined all-years file is
//! reassembled from whatever per-year files are on disk. Re-running a
//! single year therefore refreshes that year's rows everywhere without
//! touching the others. Rows are sorted and floats formatted with fixed
//! precision, making re-runs byte-identical for unchanged inputs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use mtr_tpu_models::{CensusYear, ClassifiedRecord, YearSummary};
use thiserror::Error;

/// Errors that can occur while writing result files.
#[derive(Debug, Error)]
pub enum OutputError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Per-year join files disagree on their header row, so they cannot
    /// be combined. Rerunning the named year resolves it.
    #[error("Join file {path} has a mismatched header; rerun that year")]
    HeaderMismatch {
        /// The per-year file whose header differs.
        path: PathBuf,
    },
}

/// Leading columns of the per-year and combined join files; the
/// walking-buffer columns are appended per configured radius, then
/// `excluded` closes the row.
const JOIN_HEADER_BASE: &[&str] = &[
    "tpu_code",
    "year",
    "station_count",
    "nearest_station",
    "nearest_distance_m",
    "proximity_band",
];

/// Filename prefix shared by the per-year join files.
const JOIN_FILE_PREFIX: &str = "mtr_tpu_spatial_join_";

/// Columns of the aggregate summary file.
const SUMMARY_HEADER: &[&str] = &[
    "year",
    "boundary_count",
    "station_count",
    "contains_station",
    "near",
    "far",
    "beyond",
    "excluded",
    "mean_distance_m",
    "median_distance_m",
];

/// Returns the per-year join result path.
#[must_use]
pub fn join_csv_path(out_dir: &Path, year: CensusYear) -> PathBuf {
    out_dir.join(format!("{JOIN_FILE_PREFIX}{year}.csv"))
}

/// Returns the combined all-years join result path.
#[must_use]
pub fn combined_csv_path(out_dir: &Path) -> PathBuf {
    out_dir.join("mtr_tpu_spatial_join_all_years.csv")
}

/// Returns the per-year aggregate summary path.
#[must_use]
pub fn summary_csv_path(out_dir: &Path) -> PathBuf {
    out_dir.join("mtr_tpu_summary.csv")
}

/// Formats an optional distance with centimeter precision.
fn format_distance(distance: Option<f64>) -> String {
    distance.map_or_else(String::new, |d| format!("{d:.2}"))
}

/// Column name for one walking-buffer radius, e.g. `within_500m_buffer`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn buffer_column(distance_m: f64) -> String {
    if distance_m.fract() == 0.0 && distance_m >= 0.0 {
        format!("within_{}m_buffer", distance_m as u64)
    } else {
        format!("within_{distance_m}m_buffer")
    }
}

/// Builds the join file header: base columns, one buffer column per
/// configured radius (taken from the first record carrying them), then
/// `excluded`.
fn join_header(records: &[&ClassifiedRecord]) -> Vec<String> {
    let mut header: Vec<String> = JOIN_HEADER_BASE.iter().map(ToString::to_string).collect();
    if let Some(record) = records.iter().find(|r| !r.join.buffers.is_empty()) {
        header.extend(
            record
                .join
                .buffers
                .iter()
                .map(|b| buffer_column(b.distance_m)),
        );
    }
    header.push("excluded".to_owned());
    header
}

/// Builds the CSV row for one classified record. Excluded records carry
/// empty cells in the buffer columns, like the distance and band cells.
fn record_row(record: &ClassifiedRecord, buffer_columns: usize) -> Vec<String> {
    let mut row = vec![
        record.join.key.code.clone(),
        record.join.key.year.to_string(),
        record.join.station_count.to_string(),
        record.join.nearest_station.clone().unwrap_or_default(),
        format_distance(record.join.nearest_distance_m),
        record.band.map(|b| b.to_string()).unwrap_or_default(),
    ];
    for i in 0..buffer_columns {
        row.push(
            record
                .join
                .buffers
                .get(i)
                .map_or_else(String::new, |b| b.within.to_string()),
        );
    }
    row.push(record.join.excluded.to_string());
    row
}

/// Writes join rows sorted by year then TPU code to a freshly truncated
/// file.
fn write_join_rows(path: &Path, records: &[&ClassifiedRecord]) -> Result<(), OutputError> {
    let mut sorted: Vec<&ClassifiedRecord> = records.to_vec();
    sorted.sort_by(|a, b| {
        a.join
            .key
            .year
            .cmp(&b.join.key.year)
            .then_with(|| a.join.key.code.cmp(&b.join.key.code))
    });

    let header = join_header(records);
    let buffer_columns = header.len() - JOIN_HEADER_BASE.len() - 1;

    // File::create truncates, which is what makes re-runs overwrite
    // rather than duplicate.
    let file = std::fs::File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&header)?;
    for record in sorted {
        writer.write_record(record_row(record, buffer_columns))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one census year's classified records to
/// `mtr_tpu_spatial_join_<year>.csv` under `out_dir`.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory cannot be created or the
/// file cannot be written.
pub fn write_year(
    out_dir: &Path,
    year: CensusYear,
    records: &[ClassifiedRecord],
) -> Result<PathBuf, OutputError> {
    std::fs::create_dir_all(out_dir)?;
    let path = join_csv_path(out_dir, year);
    let refs: Vec<&ClassifiedRecord> = records.iter().collect();
    write_join_rows(&path, &refs)?;
    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(path)
}

/// Lists the per-year join files present under `out_dir`, sorted by
/// year. The combined file itself never matches (its suffix is not a
/// year).
fn year_files(out_dir: &Path) -> Result<Vec<(CensusYear, PathBuf)>, OutputError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(out_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(year) = name
            .strip_prefix(JOIN_FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(".csv"))
            .and_then(|year| year.parse::<CensusYear>().ok())
        {
            files.push((year, entry.path()));
        }
    }
    files.sort_by_key(|(year, _)| *year);
    Ok(files)
}

/// Rebuilds the combined all-years file from every per-year join file
/// present under `out_dir`.
///
/// The per-year files are the source of truth, so a single-year rerun
/// refreshes that year's rows in the combined file and leaves every
/// other year's rows as last written. Returns `None` when no per-year
/// file exists.
///
/// # Errors
///
/// Returns [`OutputError`] on I/O or CSV failure, or when the per-year
/// files carry differing headers (e.g. runs with different buffer
/// radii).
pub fn write_combined(out_dir: &Path) -> Result<Option<PathBuf>, OutputError> {
    let files = year_files(out_dir)?;
    if files.is_empty() {
        return Ok(None);
    }

    let path = combined_csv_path(out_dir);
    let file = std::fs::File::create(&path)?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header: Option<csv::StringRecord> = None;
    let mut rows = 0usize;
    for (_, year_path) in &files {
        let mut reader = csv::Reader::from_path(year_path)?;
        let year_header = reader.headers()?.clone();
        match &header {
            None => {
                writer.write_record(&year_header)?;
                header = Some(year_header);
            }
            Some(expected) if *expected != year_header => {
                return Err(OutputError::HeaderMismatch {
                    path: year_path.clone(),
                });
            }
            Some(_) => {}
        }
        for record in reader.records() {
            writer.write_record(&record?)?;
            rows += 1;
        }
    }
    writer.flush()?;
    log::info!(
        "Wrote {rows} combined rows from {} year files to {}",
        files.len(),
        path.display()
    );
    Ok(Some(path))
}

/// Writes the per-year aggregate summary file, merging with any
/// existing one: rows for years not in `summaries` survive, rows for
/// recomputed years are replaced.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory cannot be created or the
/// file cannot be read or written.
pub fn write_summary(out_dir: &Path, summaries: &[YearSummary]) -> Result<PathBuf, OutputError> {
    std::fs::create_dir_all(out_dir)?;
    let path = summary_csv_path(out_dir);

    let fresh: BTreeSet<CensusYear> = summaries.iter().map(|s| s.year).collect();
    let mut rows: Vec<(CensusYear, Vec<String>)> = Vec::new();

    if path.exists() {
        let mut reader = csv::Reader::from_path(&path)?;
        for record in reader.records() {
            let record = record?;
            let Some(year) = record.get(0).and_then(|y| y.parse::<CensusYear>().ok()) else {
                continue;
            };
            if !fresh.contains(&year) {
                rows.push((year, record.iter().map(ToOwned::to_owned).collect()));
            }
        }
    }

    for summary in summaries {
        rows.push((
            summary.year,
            vec![
                summary.year.to_string(),
                summary.boundary_count.to_string(),
                summary.station_count.to_string(),
                summary.contains_station.to_string(),
                summary.near.to_string(),
                summary.far.to_string(),
                summary.beyond.to_string(),
                summary.excluded.to_string(),
                format_distance(summary.mean_distance_m),
                format_distance(summary.median_distance_m),
            ],
        ));
    }
    rows.sort_by_key(|(year, _)| *year);

    let file = std::fs::File::create(&path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(SUMMARY_HEADER)?;
    for (_, row) in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {} summary rows to {}", rows.len(), path.display());
    Ok(path)
}
