//! Canonical input paths under the project `data/` directory.
//!
//! The layout mirrors the processed data exports: raw station data under
//! `data/raw/mtr/`, standardized per-year boundary files under
//! `data/processed/tpu/`.

use std::path::{Path, PathBuf};

use mtr_tpu_models::CensusYear;

/// Returns the default station CSV path under a data directory.
#[must_use]
pub fn stations_csv(data_dir: &Path) -> PathBuf {
    data_dir.join("raw").join("mtr").join("mtr_stations.csv")
}

/// Returns the standardized boundary `GeoJSON` path for a census year.
#[must_use]
pub fn boundaries_geojson(data_dir: &Path, year: CensusYear) -> PathBuf {
    data_dir
        .join("processed")
        .join("tpu")
        .join(format!("tpu_boundaries_{year}_processed.geojson"))
}

/// Returns the `data/analysis/` output directory.
#[must_use]
pub fn analysis_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("analysis")
}
