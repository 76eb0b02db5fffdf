#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Proximity band classification and per-year aggregate statistics.
//!
//! Band thresholds are configuration, not constants: the 500 m / 1000 m
//! defaults are the reporting convention the analysis started with, and
//! changing them must never require touching the join logic. The
//! classifier only ever sees finished [`JoinRecord`]s.

use std::path::Path;

use mtr_tpu_models::{
    CensusYear, ClassifiedRecord, JoinRecord, ProximityBand, YearSummary,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in threshold configuration.
///
/// Unlike load and geometry errors these are fatal for the whole run: a
/// bad threshold makes every year's output meaningless.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Threshold values are unusable.
    #[error("Invalid thresholds: {message}")]
    InvalidThresholds {
        /// Description of the violated constraint.
        message: String,
    },
}

/// Distance thresholds for the proximity bands, in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProximityConfig {
    /// Whether the containment test assigns its own band. When disabled,
    /// boundaries containing a station classify by distance like any
    /// other (their join distance is zero, so they land in the near
    /// band).
    pub containment: bool,
    /// Upper bound of the near band.
    pub near_threshold_m: f64,
    /// Upper bound of the far band.
    pub far_threshold_m: f64,
    /// Walking-buffer radii for the per-boundary membership columns.
    /// The join flags each boundary whose polygon comes within one of
    /// these distances of a station.
    pub buffer_distances: Vec<f64>,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            containment: true,
            near_threshold_m: 500.0,
            far_threshold_m: 1000.0,
            buffer_distances: vec![500.0, 1000.0, 2000.0],
        }
    }
}

/// Config file wrapper: thresholds live under a `[proximity]` table.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    proximity: ProximityConfig,
}

impl ProximityConfig {
    /// Loads thresholds from a TOML file and validates them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or
    /// if the thresholds fail validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&contents)?;
        file.proximity.validate()?;
        Ok(file.proximity)
    }

    /// Validates threshold values: both finite and positive, near
    /// strictly below far.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThresholds`] on any violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.near_threshold_m.is_finite() || !self.far_threshold_m.is_finite() {
            return Err(ConfigError::InvalidThresholds {
                message: "thresholds must be finite".to_owned(),
            });
        }
        if self.near_threshold_m <= 0.0 || self.far_threshold_m <= 0.0 {
            return Err(ConfigError::InvalidThresholds {
                message: "thresholds must be positive".to_owned(),
            });
        }
        if self.near_threshold_m >= self.far_threshold_m {
            return Err(ConfigError::InvalidThresholds {
                message: format!(
                    "near threshold ({} m) must be below far threshold ({} m)",
                    self.near_threshold_m, self.far_threshold_m
                ),
            });
        }
        if let Some(bad) = self
            .buffer_distances
            .iter()
            .find(|d| !d.is_finite() || **d <= 0.0)
        {
            return Err(ConfigError::InvalidThresholds {
                message: format!("buffer distances must be finite and positive, got {bad}"),
            });
        }
        Ok(())
    }

    /// Assigns the band for a single non-excluded join record.
    fn band_for(&self, record: &JoinRecord) -> Option<ProximityBand> {
        if record.excluded {
            return None;
        }
        if self.containment && record.station_count > 0 {
            return Some(ProximityBand::ContainsStation);
        }
        record.nearest_distance_m.map(|d| {
            if d <= self.near_threshold_m {
                ProximityBand::Near
            } else if d <= self.far_threshold_m {
                ProximityBand::Far
            } else {
                ProximityBand::Beyond
            }
        })
    }
}

/// Assigns exactly one band to every non-excluded record.
///
/// Excluded records keep `band = None`; they are tallied separately by
/// [`summarize`] and never enter the distance aggregates.
#[must_use]
pub fn classify(records: Vec<JoinRecord>, config: &ProximityConfig) -> Vec<ClassifiedRecord> {
    records
        .into_iter()
        .map(|join| {
            let band = config.band_for(&join);
            ClassifiedRecord { join, band }
        })
        .collect()
}

/// Median of a pre-sorted, non-empty slice.
fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        f64::midpoint(sorted[mid - 1], sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Computes the aggregate summary for one classified year.
///
/// Mean and median nearest distances are computed only over non-excluded
/// records; excluded ones are counted in their own tally so invalid data
/// is never averaged over silently.
#[must_use]
pub fn summarize(
    year: CensusYear,
    records: &[ClassifiedRecord],
    station_count: usize,
) -> YearSummary {
    let mut summary = YearSummary {
        year,
        boundary_count: records.len(),
        station_count,
        contains_station: 0,
        near: 0,
        far: 0,
        beyond: 0,
        excluded: 0,
        mean_distance_m: None,
        median_distance_m: None,
    };

    let mut distances: Vec<f64> = Vec::with_capacity(records.len());

    for record in records {
        match record.band {
            Some(ProximityBand::ContainsStation) => summary.contains_station += 1,
            Some(ProximityBand::Near) => summary.near += 1,
            Some(ProximityBand::Far) => summary.far += 1,
            Some(ProximityBand::Beyond) => summary.beyond += 1,
            None => {
                summary.excluded += 1;
                continue;
            }
        }
        if let Some(d) = record.join.nearest_distance_m {
            distances.push(d);
        }
    }

    if !distances.is_empty() {
        distances.sort_by(f64::total_cmp);
        #[allow(clippy::cast_precision_loss)]
        let mean = distances.iter().sum::<f64>() / distances.len() as f64;
        summary.mean_distance_m = Some(mean);
        summary.median_distance_m = Some(median_of_sorted(&distances));
    }

    summary
}
