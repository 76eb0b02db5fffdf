//! MTR station loading from tabular CSV exports.
//!
//! Station exports vary in column naming across vintages, so columns are
//! resolved by sniffing the header row against known aliases rather than
//! by fixed position.

use std::path::Path;

use mtr_tpu_models::Station;

use crate::{LoadError, crs};

/// Header aliases for the station code column.
const ID_COLUMNS: &[&str] = &["station_code", "code", "station_id", "id"];
/// Header aliases for the English station name column.
const NAME_COLUMNS: &[&str] = &[
    "station_name_english",
    "station name (english)",
    "station_name",
    "name",
];
/// Header aliases for the line column.
const LINE_COLUMNS: &[&str] = &["line", "line_code", "system"];
/// Header aliases for the latitude column.
const LAT_COLUMNS: &[&str] = &["latitude", "lat"];
/// Header aliases for the longitude column.
const LNG_COLUMNS: &[&str] = &["longitude", "lng", "lon", "long"];

/// Finds the index of the first header matching any alias.
/// Case-insensitive; spaces and underscores are interchangeable, so
/// "Station Code" matches the `station_code` alias.
fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    let normalize = |s: &str| s.to_ascii_lowercase().replace(' ', "_");
    headers
        .iter()
        .position(|h| aliases.iter().any(|a| normalize(h) == normalize(a)))
}

/// Parses a lat/lng pair from record fields. Returns `None` if either is
/// missing, unparseable, or zero (a common placeholder for "no fix").
fn parse_lat_lng(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}

/// Loads MTR stations from a CSV file and projects each one to grid
/// meters.
///
/// Rows without usable coordinates are dropped with a log line; they are
/// common in raw exports (stations under construction, missing fixes).
///
/// # Errors
///
/// Returns [`LoadError`] if the file is missing or malformed, if the
/// name/latitude/longitude columns cannot be identified, or if no row
/// yields a usable station.
pub fn load_stations(path: &Path) -> Result<Vec<Station>, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing {
            path: path.to_path_buf(),
        });
    }

    let file = std::fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let name_idx = find_column(&headers, NAME_COLUMNS).ok_or_else(|| LoadError::MissingColumn {
        column: "name",
        path: path.to_path_buf(),
    })?;
    let lat_idx = find_column(&headers, LAT_COLUMNS).ok_or_else(|| LoadError::MissingColumn {
        column: "latitude",
        path: path.to_path_buf(),
    })?;
    let lng_idx = find_column(&headers, LNG_COLUMNS).ok_or_else(|| LoadError::MissingColumn {
        column: "longitude",
        path: path.to_path_buf(),
    })?;
    let id_idx = find_column(&headers, ID_COLUMNS);
    let line_idx = find_column(&headers, LINE_COLUMNS);

    let mut stations = Vec::new();
    let mut dropped = 0usize;

    for result in reader.records() {
        let record = result?;

        let name = record.get(name_idx).unwrap_or("").trim().to_owned();
        let Some((lat, lng)) = parse_lat_lng(record.get(lat_idx), record.get(lng_idx)) else {
            dropped += 1;
            log::debug!("Dropping station row without coordinates: {name:?}");
            continue;
        };

        if name.is_empty() {
            dropped += 1;
            continue;
        }

        let id = id_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| name.clone(), ToOwned::to_owned);
        let line = line_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned);

        stations.push(Station {
            id,
            name,
            line,
            lat,
            lng,
            grid: crs::project(lat, lng),
        });
    }

    if stations.is_empty() {
        return Err(LoadError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} station rows without usable coordinates");
    }
    log::info!("Loaded {} MTR stations from {}", stations.len(), path.display());

    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_csv(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("mtr_tpu_stations_{name}_{}.csv", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_stations_and_projects() {
        let path = write_temp_csv(
            "basic",
            "Station Code,Station Name (English),Line,Latitude,Longitude\n\
             ADM,Admiralty,Island Line,22.2790,114.1645\n\
             TST,Tsim Sha Tsui,Tsuen Wan Line,22.2976,114.1722\n",
        );
        let stations = load_stations(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "ADM");
        assert_eq!(stations[0].name, "Admiralty");
        assert_eq!(stations[0].line.as_deref(), Some("Island Line"));
        // Projected coordinates are in the HK grid range, not degrees.
        assert!(stations[0].grid.easting > 700_000.0);
    }

    #[test]
    fn drops_rows_without_coordinates() {
        let path = write_temp_csv(
            "dropped",
            "name,latitude,longitude\n\
             Admiralty,22.2790,114.1645\n\
             Ghost Station,,\n\
             Zero Island,0.0,0.0\n",
        );
        let stations = load_stations(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(stations.len(), 1);
        // Without a code column, the name doubles as the id.
        assert_eq!(stations[0].id, "Admiralty");
    }

    #[test]
    fn missing_latitude_column_is_an_error() {
        let path = write_temp_csv("nocol", "name,longitude\nAdmiralty,114.1645\n");
        let err = load_stations(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, LoadError::MissingColumn { column: "latitude", .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_stations(Path::new("/nonexistent/stations.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Missing { .. }));
    }

    #[test]
    fn all_rows_unusable_is_empty_dataset() {
        let path = write_temp_csv("empty", "name,latitude,longitude\nGhost,,\n");
        let err = load_stations(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, LoadError::EmptyDataset { .. }));
    }
}
