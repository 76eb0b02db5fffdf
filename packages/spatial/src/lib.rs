#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial join of MTR station points against TPU boundary polygons.
//!
//! For every boundary in one census year this produces the set of
//! contained stations, the distance from the boundary's centroid to the
//! nearest station, and walking-buffer membership flags (whether the
//! polygon itself comes within each configured radius of a station).
//! Nearest-neighbor lookup goes through
//! [`StationIndex`], an R-tree behind a narrow interface, so the search
//! strategy can change without touching any caller.
//!
//! Containment rule: boundary-inclusive. A station sitting exactly on a
//! polygon edge counts as contained. This is applied uniformly (via
//! [`geo::Intersects`] rather than [`geo::Contains`], which excludes the
//! boundary) so edge cases never depend on floating-point happenstance.

use geo::{Area, Centroid, Distance, Euclidean, Intersects, Point, Validation};
use mtr_tpu_models::{Boundary, BufferMembership, GridPoint, JoinRecord, Station};
use rstar::{RTree, primitives::GeomWithData};
use thiserror::Error;

/// Errors that can occur during the spatial join.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The station collection is empty. An empty nearest-distance result
    /// is meaningless, so this aborts the year rather than producing one.
    #[error("No stations available for the spatial join")]
    NoStations,

    /// A boundary polygon is degenerate. Caught per-record inside
    /// [`join_year`]; the record is flagged and retained, never dropped.
    #[error("Degenerate geometry for {key}: {reason}")]
    Degenerate {
        /// The offending boundary, as `year/code`.
        key: String,
        /// What made the geometry unusable.
        reason: String,
    },
}

/// R-tree over station grid positions.
///
/// The only query surface is [`Self::nearest`]; brute force would also be
/// correct at the current data scale (~5,000 polygons x ~100 stations per
/// year), but the index keeps the join sub-linear if the station network
/// or boundary resolution ever grows.
pub struct StationIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl StationIndex {
    /// Builds the index over a station slice. Entries carry the slice
    /// index so callers can recover the full station record.
    #[must_use]
    pub fn build(stations: &[Station]) -> Self {
        let entries = stations
            .iter()
            .enumerate()
            .map(|(i, s)| GeomWithData::new([s.grid.easting, s.grid.northing], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Returns the slice index of the nearest station and the distance to
    /// it in meters, or `None` if the index is empty.
    #[must_use]
    pub fn nearest(&self, point: GridPoint) -> Option<(usize, f64)> {
        let query = [point.easting, point.northing];
        self.tree.nearest_neighbor(&query).map(|entry| {
            let [x, y] = *entry.geom();
            let station = GridPoint {
                easting: x,
                northing: y,
            };
            (entry.data, point.distance(&station))
        })
    }
}

/// Checks a boundary polygon for degenerate geometry.
///
/// Self-intersecting rings, zero-area polygons, and polygons without a
/// computable centroid all count as degenerate.
fn validate_geometry(boundary: &Boundary) -> Result<(), GeometryError> {
    let key = boundary.key.to_string();
    if !boundary.polygon.is_valid() {
        return Err(GeometryError::Degenerate {
            key,
            reason: "invalid polygon (self-intersection or malformed rings)".to_owned(),
        });
    }
    if boundary.polygon.unsigned_area() <= 0.0 {
        return Err(GeometryError::Degenerate {
            key,
            reason: "zero-area polygon".to_owned(),
        });
    }
    if boundary.polygon.centroid().is_none() {
        return Err(GeometryError::Degenerate {
            key,
            reason: "no computable centroid".to_owned(),
        });
    }
    Ok(())
}

/// Joins one boundary against the station set.
fn join_boundary(
    boundary: &Boundary,
    stations: &[Station],
    index: &StationIndex,
    buffer_distances: &[f64],
) -> JoinRecord {
    if let Err(err) = validate_geometry(boundary) {
        log::warn!("Excluding boundary from distance metrics: {err}");
        return JoinRecord {
            key: boundary.key.clone(),
            station_count: 0,
            contained_stations: Vec::new(),
            nearest_station: None,
            nearest_distance_m: None,
            buffers: Vec::new(),
            excluded: true,
        };
    }

    // Validation guarantees a centroid exists.
    let centroid = boundary.polygon.centroid().map_or(
        GridPoint {
            easting: 0.0,
            northing: 0.0,
        },
        |c| GridPoint {
            easting: c.x(),
            northing: c.y(),
        },
    );

    let mut contained: Vec<&Station> = stations
        .iter()
        .filter(|s| {
            boundary
                .polygon
                .intersects(&Point::new(s.grid.easting, s.grid.northing))
        })
        .collect();
    contained.sort_by(|a, b| a.id.cmp(&b.id));

    let (nearest_station, nearest_distance_m) = if contained.is_empty() {
        index
            .nearest(centroid)
            .map_or((None, None), |(station_idx, distance)| {
                (Some(stations[station_idx].id.clone()), Some(distance))
            })
    } else {
        // A boundary that contains a station is at distance zero from the
        // network; report the contained station closest to the centroid.
        let closest = contained
            .iter()
            .min_by(|a, b| {
                centroid
                    .distance(&a.grid)
                    .total_cmp(&centroid.distance(&b.grid))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|s| s.id.clone());
        (closest, Some(0.0))
    };

    // Buffer membership is a polygon-edge test: the boundary is within a
    // buffer when its polygon comes within that radius of any station,
    // regardless of where its centroid sits.
    let edge_distance = if contained.is_empty() {
        stations
            .iter()
            .map(|s| {
                Euclidean.distance(
                    &Point::new(s.grid.easting, s.grid.northing),
                    &boundary.polygon,
                )
            })
            .fold(f64::INFINITY, f64::min)
    } else {
        0.0
    };
    let buffers = buffer_distances
        .iter()
        .map(|&distance_m| BufferMembership {
            distance_m,
            within: edge_distance <= distance_m,
        })
        .collect();

    JoinRecord {
        key: boundary.key.clone(),
        station_count: contained.len(),
        contained_stations: contained.iter().map(|s| s.id.clone()).collect(),
        nearest_station,
        nearest_distance_m,
        buffers,
        excluded: false,
    }
}

/// Joins every boundary of one census year against the station set.
///
/// `buffer_distances` configures the walking-buffer radii (meters); each
/// record carries one membership flag per radius, in input order.
///
/// Output order matches input boundary order, and contained-station lists
/// are sorted by station id, so results are bit-for-bit reproducible for
/// fixed inputs.
///
/// # Errors
///
/// Returns [`GeometryError::NoStations`] when `stations` is empty.
/// Degenerate boundary polygons do not fail the join; they produce
/// flagged records with `excluded=true` and no distance.
pub fn join_year(
    boundaries: &[Boundary],
    stations: &[Station],
    buffer_distances: &[f64],
) -> Result<Vec<JoinRecord>, GeometryError> {
    if stations.is_empty() {
        return Err(GeometryError::NoStations);
    }

    let index = StationIndex::build(stations);
    let records = boundaries
        .iter()
        .map(|boundary| join_boundary(boundary, stations, &index, buffer_distances))
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};
    use mtr_tpu_models::{CensusYear, TpuKey};

    use super::*;

    fn station(id: &str, easting: f64, northing: f64) -> Station {
        Station {
            id: id.to_owned(),
            name: id.to_owned(),
            line: None,
            lat: 0.0,
            lng: 0.0,
            grid: GridPoint { easting, northing },
        }
    }

    fn square(code: &str, cx: f64, cy: f64, half: f64) -> Boundary {
        let ring = LineString::from(vec![
            (cx - half, cy - half),
            (cx + half, cy - half),
            (cx + half, cy + half),
            (cx - half, cy + half),
            (cx - half, cy - half),
        ]);
        Boundary {
            key: TpuKey {
                year: CensusYear(2016),
                code: code.to_owned(),
            },
            name: None,
            polygon: MultiPolygon(vec![Polygon::new(ring, vec![])]),
        }
    }

    fn bowtie(code: &str) -> Boundary {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (100.0, 100.0),
            (100.0, 0.0),
            (0.0, 100.0),
            (0.0, 0.0),
        ]);
        Boundary {
            key: TpuKey {
                year: CensusYear(2016),
                code: code.to_owned(),
            },
            name: None,
            polygon: MultiPolygon(vec![Polygon::new(ring, vec![])]),
        }
    }

    #[test]
    fn contained_station_means_zero_distance() {
        let stations = vec![station("ADM", 0.0, 0.0)];
        let boundaries = vec![square("A", 0.0, 0.0, 100.0)];

        let records = join_year(&boundaries, &stations, &[]).unwrap();
        assert_eq!(records[0].station_count, 1);
        assert_eq!(records[0].contained_stations, vec!["ADM"]);
        assert_eq!(records[0].nearest_distance_m, Some(0.0));
        assert_eq!(records[0].nearest_station.as_deref(), Some("ADM"));
        assert!(!records[0].excluded);
    }

    #[test]
    fn centroid_distance_for_non_containing_boundary() {
        let stations = vec![station("ADM", 0.0, 0.0)];
        // Square centered 1000 m east of the station, too small to
        // contain it.
        let boundaries = vec![square("B", 1000.0, 0.0, 50.0)];

        let records = join_year(&boundaries, &stations, &[]).unwrap();
        assert_eq!(records[0].station_count, 0);
        let d = records[0].nearest_distance_m.unwrap();
        assert!((d - 1000.0).abs() < 1e-6, "expected 1000 m, got {d}");
    }

    #[test]
    fn buffer_membership_tests_polygon_edge_not_centroid() {
        let stations = vec![station("ADM", 0.0, 0.0)];
        // Centroid 1000 m east of the station, but the western edge is
        // only 400 m away: a centroid rule would miss the 500 m buffer.
        let boundaries = vec![square("B", 1000.0, 0.0, 600.0)];

        let records = join_year(&boundaries, &stations, &[500.0, 1000.0, 2000.0]).unwrap();
        let flags: Vec<bool> = records[0].buffers.iter().map(|b| b.within).collect();
        assert_eq!(flags, vec![true, true, true]);
        let d = records[0].nearest_distance_m.unwrap();
        assert!((d - 1000.0).abs() < 1e-6, "centroid distance stays 1000 m, got {d}");
    }

    #[test]
    fn distant_boundary_is_outside_all_buffers() {
        let stations = vec![station("ADM", 0.0, 0.0)];
        // Nearest edge 2800 m away.
        let boundaries = vec![square("C", 3000.0, 0.0, 200.0)];

        let records = join_year(&boundaries, &stations, &[500.0, 1000.0, 2000.0]).unwrap();
        let flags: Vec<bool> = records[0].buffers.iter().map(|b| b.within).collect();
        assert_eq!(flags, vec![false, false, false]);
        assert_eq!(records[0].buffers[2].distance_m, 2000.0);
    }

    #[test]
    fn containing_boundary_is_inside_every_buffer() {
        let stations = vec![station("ADM", 0.0, 0.0)];
        let boundaries = vec![square("A", 0.0, 0.0, 100.0)];

        let records = join_year(&boundaries, &stations, &[500.0, 1000.0]).unwrap();
        assert!(records[0].buffers.iter().all(|b| b.within));
    }

    #[test]
    fn station_on_edge_counts_as_contained() {
        // Station exactly on the western edge of the square.
        let stations = vec![station("EDGE", -100.0, 0.0)];
        let boundaries = vec![square("A", 0.0, 0.0, 100.0)];

        let records = join_year(&boundaries, &stations, &[]).unwrap();
        assert_eq!(records[0].station_count, 1);
        assert_eq!(records[0].nearest_distance_m, Some(0.0));
    }

    #[test]
    fn station_in_hole_is_not_contained() {
        let exterior = LineString::from(vec![
            (-100.0, -100.0),
            (100.0, -100.0),
            (100.0, 100.0),
            (-100.0, 100.0),
            (-100.0, -100.0),
        ]);
        let hole = LineString::from(vec![
            (-10.0, -10.0),
            (-10.0, 10.0),
            (10.0, 10.0),
            (10.0, -10.0),
            (-10.0, -10.0),
        ]);
        let boundaries = vec![Boundary {
            key: TpuKey {
                year: CensusYear(2016),
                code: "H".to_owned(),
            },
            name: None,
            polygon: MultiPolygon(vec![Polygon::new(exterior, vec![hole])]),
        }];
        let stations = vec![station("IN_HOLE", 0.0, 0.0)];

        let records = join_year(&boundaries, &stations, &[]).unwrap();
        assert_eq!(records[0].station_count, 0);
        // Distance is from the centroid, which also sits in the hole.
        assert!(records[0].nearest_distance_m.is_some());
    }

    #[test]
    fn degenerate_polygon_is_flagged_not_dropped() {
        let stations = vec![station("ADM", 0.0, 0.0)];
        let boundaries = vec![
            square("OK", 500.0, 0.0, 50.0),
            bowtie("BAD"),
            square("OK2", 0.0, 300.0, 50.0),
        ];

        let records = join_year(&boundaries, &stations, &[500.0]).unwrap();
        assert_eq!(records.len(), 3);
        assert!(!records[0].excluded);
        assert!(records[1].excluded);
        assert_eq!(records[1].nearest_distance_m, None);
        assert!(records[1].buffers.is_empty());
        assert!(!records[2].excluded);
        assert!((records[2].nearest_distance_m.unwrap() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn multiple_contained_stations_sorted_by_id() {
        let stations = vec![
            station("TST", 10.0, 0.0),
            station("ADM", -10.0, 0.0),
            station("FAR", 5000.0, 0.0),
        ];
        let boundaries = vec![square("A", 0.0, 0.0, 100.0)];

        let records = join_year(&boundaries, &stations, &[]).unwrap();
        assert_eq!(records[0].station_count, 2);
        assert_eq!(records[0].contained_stations, vec!["ADM", "TST"]);
    }

    #[test]
    fn empty_station_set_is_an_error() {
        let boundaries = vec![square("A", 0.0, 0.0, 100.0)];
        assert!(matches!(
            join_year(&boundaries, &[], &[]),
            Err(GeometryError::NoStations)
        ));
    }

    #[test]
    fn nearest_index_matches_brute_force() {
        let stations: Vec<Station> = (0..20)
            .map(|i| {
                let f = f64::from(i);
                station(&format!("S{i:02}"), f * 137.0 % 900.0, f * 251.0 % 700.0)
            })
            .collect();
        let index = StationIndex::build(&stations);

        let probe = GridPoint {
            easting: 333.0,
            northing: 444.0,
        };
        let (idx, dist) = index.nearest(probe).unwrap();

        let brute = stations
            .iter()
            .map(|s| probe.distance(&s.grid))
            .fold(f64::INFINITY, f64::min);
        assert!((dist - brute).abs() < 1e-9);
        assert!((probe.distance(&stations[idx].grid) - brute).abs() < 1e-9);
    }
}
