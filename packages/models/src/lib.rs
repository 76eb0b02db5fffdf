#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared domain types for the MTR-TPU spatial analysis toolchain.
//!
//! These types flow between the loader, spatial join, classifier, and
//! output crates. Geometry is always stored in Hong Kong 1980 Grid
//! coordinates (meters); the loader performs the WGS84 conversion exactly
//! once, so nothing downstream ever mixes degrees and meters.

use std::fmt;
use std::str::FromStr;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// A census year (e.g. 2001). TPU boundaries are redrawn between census
/// years, so a year is half of every TPU identity (see [`TpuKey`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CensusYear(pub u16);

impl CensusYear {
    /// The census years covered by the analysis by default.
    pub const DEFAULT_YEARS: [Self; 5] =
        [Self(2001), Self(2006), Self(2011), Self(2016), Self(2021)];
}

impl fmt::Display for CensusYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CensusYear {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u16>().map(Self)
    }
}

/// Year-scoped TPU identifier.
///
/// TPU codes are only unique within one census year; the (year, code) pair
/// is the sole key ever used, which prevents silent cross-year collisions
/// when boundaries are redrawn.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpuKey {
    /// Census year this code belongs to.
    pub year: CensusYear,
    /// TPU code as it appears in the source boundary file.
    pub code: String,
}

impl fmt::Display for TpuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.code)
    }
}

/// A point in Hong Kong 1980 Grid coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPoint {
    /// Easting in meters.
    pub easting: f64,
    /// Northing in meters.
    pub northing: f64,
}

impl GridPoint {
    /// Euclidean distance to another grid point, in meters.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.easting - other.easting).hypot(self.northing - other.northing)
    }
}

/// An MTR station with both its source WGS84 coordinates and its projected
/// grid position. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Station identifier (code from the source file, e.g. "ADM").
    pub id: String,
    /// English station name.
    pub name: String,
    /// Line or system the station belongs to, if present in the source.
    pub line: Option<String>,
    /// WGS84 latitude as loaded.
    pub lat: f64,
    /// WGS84 longitude as loaded.
    pub lng: f64,
    /// Projected HK1980 grid position.
    pub grid: GridPoint,
}

/// A TPU boundary polygon for one census year, in grid meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    /// Year-scoped identifier.
    pub key: TpuKey,
    /// Human-readable name, when the source file carries one.
    pub name: Option<String>,
    /// Polygon geometry (possibly multiple rings, possibly with holes),
    /// already projected to grid meters.
    pub polygon: MultiPolygon<f64>,
}

/// Membership of a boundary in one station walking buffer.
///
/// `within` is true when the boundary polygon comes within `distance_m`
/// of any station point, i.e. the polygon intersects the union of the
/// station buffers of that radius. This is a polygon-edge test, distinct
/// from the centroid distance carried by [`JoinRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferMembership {
    /// Buffer radius in meters.
    pub distance_m: f64,
    /// Whether the boundary intersects a station buffer of this radius.
    pub within: bool,
}

/// The spatial join result for a single boundary.
///
/// `excluded` is set for degenerate geometry; such records carry no
/// distance and are kept (never silently dropped) so the output row count
/// always matches the input boundary count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRecord {
    /// Year-scoped TPU identifier.
    pub key: TpuKey,
    /// Number of stations whose point falls within the polygon.
    pub station_count: usize,
    /// Ids of contained stations, sorted for deterministic output.
    pub contained_stations: Vec<String>,
    /// Id of the nearest station, when a distance could be computed.
    pub nearest_station: Option<String>,
    /// Distance in meters to the nearest station. Zero when the boundary
    /// contains a station; `None` when the record is excluded.
    pub nearest_distance_m: Option<f64>,
    /// Walking-buffer memberships, one per configured buffer radius.
    /// Empty when the record is excluded.
    pub buffers: Vec<BufferMembership>,
    /// Set when the boundary geometry was degenerate.
    pub excluded: bool,
}

/// Discrete classification of a boundary's distance to the MTR network.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProximityBand {
    /// The boundary contains at least one station.
    ContainsStation,
    /// Nearest station within the near threshold (default 500 m).
    Near,
    /// Nearest station within the far threshold (default 1000 m).
    Far,
    /// Nearest station beyond the far threshold.
    Beyond,
}

/// A join record with its assigned proximity band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRecord {
    /// The underlying join result.
    pub join: JoinRecord,
    /// Assigned band; `None` iff the record is excluded.
    pub band: Option<ProximityBand>,
}

/// Aggregate statistics for one completed census year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    /// Census year.
    pub year: CensusYear,
    /// Total boundaries processed (including excluded ones).
    pub boundary_count: usize,
    /// Stations loaded for the join.
    pub station_count: usize,
    /// Boundaries containing at least one station.
    pub contains_station: usize,
    /// Boundaries in the near band.
    pub near: usize,
    /// Boundaries in the far band.
    pub far: usize,
    /// Boundaries in the beyond band.
    pub beyond: usize,
    /// Boundaries excluded for degenerate geometry.
    pub excluded: usize,
    /// Mean nearest-station distance over non-excluded boundaries.
    pub mean_distance_m: Option<f64>,
    /// Median nearest-station distance over non-excluded boundaries.
    pub median_distance_m: Option<f64>,
}

/// Why a year was skipped rather than processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// No boundary file exists for the year ("awaiting data").
    Unavailable,
    /// The year's input existed but failed to load.
    LoadFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "source data unavailable"),
            Self::LoadFailed(msg) => write!(f, "load failed: {msg}"),
        }
    }
}

/// Outcome of one year's pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum YearOutcome {
    /// The year ran to completion and its files were written.
    Completed(YearSummary),
    /// The year was skipped; the rest of the batch is unaffected.
    Skipped {
        /// The skipped year.
        year: CensusYear,
        /// Why it was skipped.
        reason: SkipReason,
    },
}

impl YearOutcome {
    /// The year this outcome belongs to.
    #[must_use]
    pub const fn year(&self) -> CensusYear {
        match self {
            Self::Completed(summary) => summary.year,
            Self::Skipped { year, .. } => *year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn census_year_parses_and_displays() {
        let year: CensusYear = "2016".parse().unwrap();
        assert_eq!(year, CensusYear(2016));
        assert_eq!(year.to_string(), "2016");
    }

    #[test]
    fn tpu_keys_differ_across_years() {
        let a = TpuKey {
            year: CensusYear(2011),
            code: "111".to_string(),
        };
        let b = TpuKey {
            year: CensusYear(2016),
            code: "111".to_string(),
        };
        assert_ne!(a, b);
    }

    #[test]
    fn grid_distance_is_euclidean() {
        let a = GridPoint {
            easting: 0.0,
            northing: 0.0,
        };
        let b = GridPoint {
            easting: 3.0,
            northing: 4.0,
        };
        assert!((a.distance(&b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn band_serializes_kebab_case() {
        assert_eq!(ProximityBand::ContainsStation.to_string(), "contains-station");
        assert_eq!(ProximityBand::Near.to_string(), "near");
        let parsed: ProximityBand = "beyond".parse().unwrap();
        assert_eq!(parsed, ProximityBand::Beyond);
    }
}
