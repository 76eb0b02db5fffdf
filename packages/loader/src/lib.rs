#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Loaders for MTR station and TPU boundary source files.
//!
//! Stations arrive as a tabular CSV, boundaries as per-year `GeoJSON`
//! files. Everything is re-projected from WGS84 to the Hong Kong 1980
//! Grid ([`crs`]) at load time, so downstream crates only ever see
//! metric coordinates.

pub mod boundaries;
pub mod crs;
pub mod paths;
pub mod stations;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading source files.
///
/// A `LoadError` is recoverable at the per-year granularity: the pipeline
/// skips the affected year and continues with the rest of the batch.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The source file does not exist.
    #[error("Missing input file: {path}")]
    Missing {
        /// The path that was checked.
        path: PathBuf,
    },

    /// A required tabular column could not be found.
    #[error("Missing column {column:?} in {path}")]
    MissingColumn {
        /// The column that was looked for.
        column: &'static str,
        /// The file that was parsed.
        path: PathBuf,
    },

    /// The file parsed but its structure was not what was expected.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// The file parsed but contained no usable records.
    #[error("No usable records in {path}")]
    EmptyDataset {
        /// The file that was parsed.
        path: PathBuf,
    },
}
