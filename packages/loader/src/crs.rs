//! WGS84 ↔ Hong Kong 1980 Grid coordinate conversion.
//!
//! All distance math in this workspace happens in grid meters, and the
//! conversion from source latitude/longitude happens exactly once, here,
//! at load time. That makes "degrees accidentally compared to meters"
//! unrepresentable downstream.
//!
//! The projection is the EPSG:2326 transverse Mercator (International
//! 1924 ellipsoid, origin 22°18′43.68″N / 114°10′42.80″E, unit scale,
//! false easting 836694.05 m, false northing 819069.80 m), evaluated with
//! the standard series expansions. The small WGS84→HK80 datum shift is
//! deliberately not applied: every input shares WGS84, and only relative
//! distances feed the analysis, so a common-mode offset of the grid
//! cancels out.

use geo::{MapCoords, MultiPolygon};
use mtr_tpu_models::GridPoint;

/// International 1924 semi-major axis, meters.
const A: f64 = 6_378_388.0;
/// International 1924 flattening.
const F: f64 = 1.0 / 297.0;
/// First eccentricity squared.
const E2: f64 = 2.0 * F - F * F;
/// Second eccentricity squared.
const EP2: f64 = E2 / (1.0 - E2);

/// Projection scale factor at the central meridian.
const K0: f64 = 1.0;
/// False easting, meters.
const FALSE_EASTING: f64 = 836_694.05;
/// False northing, meters.
const FALSE_NORTHING: f64 = 819_069.80;
/// Latitude of the projection origin, degrees (22°18′43.68″N).
const ORIGIN_LAT_DEG: f64 = 22.0 + 18.0 / 60.0 + 43.68 / 3600.0;
/// Longitude of the central meridian, degrees (114°10′42.80″E).
const ORIGIN_LNG_DEG: f64 = 114.0 + 10.0 / 60.0 + 42.80 / 3600.0;

/// Meridian arc length from the equator to `lat` (radians), meters.
fn meridian_arc(lat: f64) -> f64 {
    A * ((1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * E2 * E2 / 32.0 + 45.0 * E2 * E2 * E2 / 1024.0)
            * (2.0 * lat).sin()
        + (15.0 * E2 * E2 / 256.0 + 45.0 * E2 * E2 * E2 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * E2 * E2 * E2 / 3072.0) * (6.0 * lat).sin())
}

/// Projects a WGS84 latitude/longitude (degrees) to grid meters.
#[must_use]
pub fn project(lat_deg: f64, lng_deg: f64) -> GridPoint {
    let lat = lat_deg.to_radians();
    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = EP2 * cos_lat * cos_lat;
    let a = (lng_deg - ORIGIN_LNG_DEG).to_radians() * cos_lat;
    let m = meridian_arc(lat);
    let m0 = meridian_arc(ORIGIN_LAT_DEG.to_radians());

    let easting = FALSE_EASTING
        + K0 * n
            * (a
                + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * EP2) * a.powi(5) / 120.0);

    let northing = FALSE_NORTHING
        + K0 * (m - m0
            + n * tan_lat
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * EP2) * a.powi(6) / 720.0));

    GridPoint { easting, northing }
}

/// Inverse projection: grid meters back to WGS84 (latitude, longitude)
/// in degrees.
#[must_use]
pub fn unproject(point: GridPoint) -> (f64, f64) {
    let m0 = meridian_arc(ORIGIN_LAT_DEG.to_radians());
    let m = m0 + (point.northing - FALSE_NORTHING) / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0));

    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let footpoint = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_fp = footpoint.sin();
    let cos_fp = footpoint.cos();
    let tan_fp = footpoint.tan();

    let c1 = EP2 * cos_fp * cos_fp;
    let t1 = tan_fp * tan_fp;
    let n1 = A / (1.0 - E2 * sin_fp * sin_fp).sqrt();
    let r1 = A * (1.0 - E2) / (1.0 - E2 * sin_fp * sin_fp).powf(1.5);
    let d = (point.easting - FALSE_EASTING) / (n1 * K0);

    let lat = footpoint
        - (n1 * tan_fp / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * EP2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * EP2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lng_offset = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * EP2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos_fp;

    (lat.to_degrees(), ORIGIN_LNG_DEG + lng_offset.to_degrees())
}

/// Projects every coordinate of a WGS84 [`MultiPolygon`] to grid meters.
#[must_use]
pub fn project_multipolygon(polygon: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    polygon.map_coords(|coord| {
        let grid = project(coord.y, coord.x);
        geo::Coord {
            x: grid.easting,
            y: grid.northing,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points spread across Hong Kong territory.
    const SAMPLES: [(f64, f64); 4] = [
        (22.3027, 114.1772), // Tsim Sha Tsui
        (22.2783, 114.1747), // Admiralty
        (22.4445, 114.0222), // Tuen Mun
        (22.2094, 114.2569), // Stanley
    ];

    #[test]
    fn round_trip_recovers_coordinates() {
        for (lat, lng) in SAMPLES {
            let grid = project(lat, lng);
            let (lat2, lng2) = unproject(grid);
            let error_m = project(lat2, lng2).distance(&grid);
            assert!(
                error_m < 0.01,
                "round trip error {error_m} m for ({lat}, {lng})"
            );
        }
    }

    #[test]
    fn grid_coordinates_are_in_hk_range() {
        // HK1980 grid coordinates for the territory sit roughly within
        // 800k-860k easting and 800k-850k northing.
        for (lat, lng) in SAMPLES {
            let grid = project(lat, lng);
            assert!(
                (790_000.0..870_000.0).contains(&grid.easting),
                "easting {} out of range",
                grid.easting
            );
            assert!(
                (790_000.0..860_000.0).contains(&grid.northing),
                "northing {} out of range",
                grid.northing
            );
        }
    }

    #[test]
    fn one_degree_of_latitude_is_metric() {
        // ~0.009 degrees of latitude is close to one kilometer on the
        // ellipsoid; the projected distance must agree to a few meters.
        let a = project(22.300, 114.170);
        let b = project(22.309, 114.170);
        let d = a.distance(&b);
        assert!((d - 996.0).abs() < 10.0, "expected ~996 m, got {d}");
    }

    #[test]
    fn projection_preserves_relative_bearing() {
        // A point due east of another stays (approximately) due east.
        let west = project(22.30, 114.10);
        let east = project(22.30, 114.20);
        assert!(east.easting > west.easting);
        assert!((east.northing - west.northing).abs() < 100.0);
    }
}
