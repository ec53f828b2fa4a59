//! County reference table: `fips,name,state,land_area,lon,lat,population`.

use std::io::Read;
use std::path::Path;

use covid_corr_geography_models::fips::{normalize_county_fips, region_of_state};
use covid_corr_geography_models::{CountyRecord, DataGap, GapReason};
use serde::Deserialize;

use crate::IngestError;

/// A raw row of the county reference table.
#[derive(Debug, Deserialize)]
struct CountyRow {
    fips: String,
    #[serde(default)]
    name: String,
    /// Two-letter abbreviation, two-digit state FIPS or full state name.
    #[serde(default)]
    state: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    land_area: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    population: Option<f64>,
}

impl CountyRow {
    /// Converts into a [`CountyRecord`], or a gap if the identity cannot
    /// be normalized. Validation against the population floor and
    /// coordinate ranges happens later, in the county index.
    fn into_record(self) -> Result<CountyRecord, DataGap> {
        let Some(fips) = normalize_county_fips(&self.fips) else {
            return Err(DataGap::new(self.fips, GapReason::UnresolvableIdentity));
        };

        Ok(CountyRecord {
            region: region_of_state(&self.state),
            fips,
            name: self.name,
            land_area_sq_mi: self.land_area,
            centroid_lon: self.lon,
            centroid_lat: self.lat,
            population: self.population.and_then(whole_count),
        })
    }
}

/// Rounds a non-negative finite figure to a whole count.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn whole_count(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

/// Reads the county reference table from any reader.
///
/// Rows whose FIPS code cannot be normalized are returned as gaps; rows
/// that do not parse at all are skipped and logged.
///
/// # Errors
///
/// Returns [`IngestError`] on I/O failure or an unreadable header.
pub fn parse_counties(reader: impl Read) -> Result<(Vec<CountyRecord>, Vec<DataGap>), IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut gaps = Vec::new();
    let mut malformed = 0usize;

    for result in csv_reader.deserialize::<CountyRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(IngestError::csv("<reader>", e)),
            Err(e) => {
                log::trace!("  skipping malformed county row: {e}");
                malformed += 1;
                continue;
            }
        };

        match row.into_record() {
            Ok(record) => records.push(record),
            Err(gap) => gaps.push(gap),
        }
    }

    if malformed > 0 {
        log::warn!("Skipped {malformed} malformed county rows");
    }
    log::info!(
        "Read {} county rows ({} unresolvable)",
        records.len(),
        gaps.len()
    );

    Ok((records, gaps))
}

/// Reads the county reference table from a file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or read.
pub fn read_counties(path: &Path) -> Result<(Vec<CountyRecord>, Vec<DataGap>), IngestError> {
    parse_counties(crate::open(path)?).map_err(|e| e.at(path))
}
