//! TPU boundary loading from per-year `GeoJSON` files.
//!
//! Boundary files from different census vintages disagree on the name of
//! the TPU identifier property, so the loader probes a list of known
//! property names (the same list the processed exports were built from).

use std::path::Path;

use geo::MultiPolygon;
use geojson::GeoJson;
use mtr_tpu_models::{Boundary, CensusYear, TpuKey};

use crate::{LoadError, crs};

/// Property names that may carry the TPU identifier, probed in order.
const TPU_ID_PROPERTIES: &[&str] = &["TPU_ID", "TPU", "TPU_CODE", "CODE", "ID", "OBJECTID", "FID"];

/// Property names that may carry a human-readable area name.
const NAME_PROPERTIES: &[&str] = &["NAME", "TPU_NAME", "DISTRICT"];

/// Extracts a property as a string, accepting both string and numeric
/// JSON values (vintages differ).
fn property_string(feature: &geojson::Feature, keys: &[&str]) -> Option<String> {
    let properties = feature.properties.as_ref()?;
    for key in keys {
        match properties.get(*key) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.trim().to_owned());
            }
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Converts a `GeoJSON` feature geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types; anything
/// else yields `None`.
fn feature_multipolygon(feature: &geojson::Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Loads one census year's TPU boundaries and projects them to grid
/// meters.
///
/// Features without polygon geometry are dropped with a log line.
/// Features without any recognizable identifier property fall back to
/// their feature index, matching the processed exports' behavior.
///
/// # Errors
///
/// Returns [`LoadError`] if the file is missing, is not a `GeoJSON`
/// `FeatureCollection`, or yields no boundaries at all.
pub fn load_boundaries(path: &Path, year: CensusYear) -> Result<Vec<Boundary>, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path)?;
    let geojson: GeoJson = contents.parse()?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(LoadError::Parse {
            message: format!("{} is not a GeoJSON FeatureCollection", path.display()),
        });
    };

    let mut boundaries = Vec::new();
    let mut dropped = 0usize;

    for (index, feature) in collection.features.iter().enumerate() {
        let Some(polygon) = feature_multipolygon(feature) else {
            dropped += 1;
            log::debug!("Dropping feature {index} without polygon geometry");
            continue;
        };

        let code = property_string(feature, TPU_ID_PROPERTIES)
            .unwrap_or_else(|| index.to_string());

        boundaries.push(Boundary {
            key: TpuKey { year, code },
            name: property_string(feature, NAME_PROPERTIES),
            polygon: crs::project_multipolygon(&polygon),
        });
    }

    if boundaries.is_empty() {
        return Err(LoadError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} features without polygon geometry for {year}");
    }
    log::info!(
        "Loaded {} TPU boundaries for {year} from {}",
        boundaries.len(),
        path.display()
    );

    Ok(boundaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "TPU_ID": "131", "NAME": "Mid-Levels" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [114.14, 22.27], [114.16, 22.27],
                        [114.16, 22.29], [114.14, 22.29],
                        [114.14, 22.27]
                    ]]
                }
            },
            {
                "type": "Feature",
                "properties": { "OBJECTID": 42 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[
                        [114.20, 22.30], [114.22, 22.30],
                        [114.22, 22.32], [114.20, 22.32],
                        [114.20, 22.30]
                    ]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Point",
                    "coordinates": [114.15, 22.28]
                }
            }
        ]
    }"#;

    fn write_temp_geojson(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mtr_tpu_boundaries_{name}_{}.geojson",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_polygons_and_projects_to_grid() {
        let path = write_temp_geojson("basic", SAMPLE);
        let boundaries = load_boundaries(&path, CensusYear(2016)).unwrap();
        std::fs::remove_file(&path).unwrap();

        // The point feature is dropped; both polygon features load.
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].key.year, CensusYear(2016));
        assert_eq!(boundaries[0].key.code, "131");
        assert_eq!(boundaries[0].name.as_deref(), Some("Mid-Levels"));
        // Numeric fallback identifier.
        assert_eq!(boundaries[1].key.code, "42");

        // Coordinates were re-projected out of degree space.
        let exterior = boundaries[0].polygon.0[0].exterior();
        assert!(exterior.0.iter().all(|c| c.x > 700_000.0));
    }

    #[test]
    fn non_collection_is_a_parse_error() {
        let path = write_temp_geojson(
            "geom",
            r#"{ "type": "Point", "coordinates": [114.15, 22.28] }"#,
        );
        let err = load_boundaries(&path, CensusYear(2011)).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err =
            load_boundaries(Path::new("/nonexistent/tpu.geojson"), CensusYear(2001)).unwrap_err();
        assert!(matches!(err, LoadError::Missing { .. }));
    }
}
