//! Population table: a `fips` column followed by one or more year columns.
//!
//! The year columns are averaged into a single figure per county; empty or
//! unparseable cells are ignored rather than counted as zero.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use covid_corr_geography_models::fips::normalize_county_fips;

use crate::IngestError;
use crate::counties::whole_count;

/// Reads the population table from any reader into a FIPS-keyed map.
///
/// Rows with an unresolvable identity or without any usable year value are
/// skipped. A repeated identity replaces the earlier row.
///
/// # Errors
///
/// Returns [`IngestError::MissingColumn`] if there is no `fips` column, or
/// a CSV error if the input cannot be read.
#[allow(clippy::cast_precision_loss)]
pub fn parse_population(reader: impl Read) -> Result<BTreeMap<String, u64>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| IngestError::csv("<reader>", e))?
        .clone();
    let fips_column = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("fips"))
        .ok_or_else(|| IngestError::MissingColumn {
            path: "<reader>".to_string(),
            column: "fips".to_string(),
        })?;

    let mut population = BTreeMap::new();
    let mut skipped = 0usize;

    for result in csv_reader.records() {
        let record = result.map_err(|e| IngestError::csv("<reader>", e))?;

        let Some(fips) = record.get(fips_column).and_then(normalize_county_fips) else {
            skipped += 1;
            continue;
        };

        let values: Vec<f64> = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != fips_column)
            .filter_map(|(_, cell)| cell.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            log::debug!("No population figures for {fips}");
            skipped += 1;
            continue;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        match whole_count(mean) {
            Some(pop) => {
                if population.insert(fips.clone(), pop).is_some() {
                    log::debug!("Duplicate population row for {fips}");
                }
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} population rows without a usable figure");
    }
    log::info!("Read population for {} counties", population.len());

    Ok(population)
}

/// Reads the population table from a file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or read.
pub fn read_population(path: &Path) -> Result<BTreeMap<String, u64>, IngestError> {
    parse_population(crate::open(path)?).map_err(|e| e.at(path))
}
