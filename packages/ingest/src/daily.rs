//! Daily case/death records: `date,fips,cases,deaths`.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use covid_corr_signal::DailyRecord;
use serde::Deserialize;

use crate::IngestError;

#[derive(Debug, Deserialize)]
struct DailyRow {
    date: NaiveDate,
    /// Kept verbatim; normalization happens in the signal stages so that
    /// unresolvable identities are reported there.
    #[serde(default)]
    fips: String,
    cases: f64,
    deaths: f64,
}

impl DailyRow {
    #[allow(clippy::cast_possible_truncation)]
    fn into_record(self) -> Option<DailyRecord> {
        if !(self.cases.is_finite() && self.deaths.is_finite()) {
            return None;
        }
        Some(DailyRecord {
            date: self.date,
            fips: self.fips,
            cases: self.cases.round() as i64,
            deaths: self.deaths.round() as i64,
        })
    }
}

/// Reads daily records from any reader. Rows with an unparseable date or
/// count are skipped and logged.
///
/// # Errors
///
/// Returns [`IngestError`] on I/O failure.
pub fn parse_daily(reader: impl Read) -> Result<Vec<DailyRecord>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut malformed = 0usize;

    for result in csv_reader.deserialize::<DailyRow>() {
        match result {
            Ok(row) => match row.into_record() {
                Some(record) => records.push(record),
                None => malformed += 1,
            },
            Err(e) if e.is_io_error() => return Err(IngestError::csv("<reader>", e)),
            Err(e) => {
                log::trace!("  skipping malformed daily row: {e}");
                malformed += 1;
            }
        }
    }

    if malformed > 0 {
        log::warn!("Skipped {malformed} malformed daily rows");
    }
    log::info!("Read {} daily records", records.len());

    Ok(records)
}

/// Reads daily records from a file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or read.
pub fn read_daily(path: &Path) -> Result<Vec<DailyRecord>, IngestError> {
    parse_daily(crate::open(path)?).map_err(|e| e.at(path))
}
