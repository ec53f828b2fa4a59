//! CSV and JSON writers for analysis results.
//!
//! Undefined values are written as empty cells (CSV) or `null` (JSON).

use std::io::Write;

use covid_corr_analytics_models::{WeekResult, WeekStatus, WeeklySeries};
use covid_corr_geography_models::DataGap;
use covid_corr_spatial::{DistanceBinner, GeoIndex, PairwiseCorpus};
use serde::Serialize;

use crate::IngestError;

/// Column label of a distance bin, e.g. `c_50km` or `c_277.98km`.
#[must_use]
pub fn bin_label(upper_km: f64) -> String {
    if upper_km.fract() == 0.0 {
        format!("c_{upper_km:.0}km")
    } else {
        format!("c_{upper_km}km")
    }
}

/// Short status label used in the weekly table.
#[must_use]
pub const fn status_label(status: &WeekStatus) -> &'static str {
    match status {
        WeekStatus::Computed => "computed",
        WeekStatus::Skipped { .. } => "skipped",
        WeekStatus::AllBinsUndefined => "all_bins_undefined",
    }
}

fn flush<W: Write>(out: &mut csv::Writer<W>) -> Result<(), IngestError> {
    out.flush().map_err(|e| IngestError::Io {
        path: "<writer>".to_string(),
        source: e,
    })
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the weekly time series: one row per week with totals, status,
/// one correlation column per bin and both correlation lengths.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_weekly_series(writer: impl Write, series: &WeeklySeries) -> Result<(), IngestError> {
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |e| IngestError::csv("<writer>", e);

    let mut header: Vec<String> = [
        "week",
        "date",
        "total_cases",
        "total_deaths",
        "case_delta",
        "status",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    header.extend(series.bin_upper_bounds_km.iter().map(|&u| bin_label(u)));
    header.push("xi_interpolation_km".to_string());
    header.push("xi_significance_km".to_string());
    out.write_record(&header).map_err(csv_err)?;

    let bins = series.bin_upper_bounds_km.len();
    for week in &series.weeks {
        let mut row = vec![
            week.week.to_string(),
            cell(week.start),
            cell(week.total_cases),
            cell(week.total_deaths),
            cell(week.case_delta),
            status_label(&week.status).to_string(),
        ];
        match &week.curve {
            Some(curve) => row.extend(curve.bins.iter().map(|b| cell(b.value))),
            None => row.extend(std::iter::repeat_n(String::new(), bins)),
        }
        row.push(cell(week.length.interpolation_km));
        row.push(cell(week.length.significance_km));
        out.write_record(&row).map_err(csv_err)?;
    }

    flush(&mut out)
}

#[derive(Serialize)]
struct CurveRow {
    bin: usize,
    lower_km: f64,
    upper_km: f64,
    midpoint_km: f64,
    pairs: usize,
    value: Option<f64>,
    p_value: Option<f64>,
    significant: Option<bool>,
    degenerate: Option<String>,
}

/// Writes a single week's curve as CSV, one row per bin.
///
/// A week without a curve writes only the header.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_curve_csv(writer: impl Write, week: &WeekResult) -> Result<(), IngestError> {
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |e| IngestError::csv("<writer>", e);

    let bins = week.curve.as_ref().map_or(&[][..], |c| c.bins.as_slice());
    if bins.is_empty() {
        out.write_record([
            "bin",
            "lower_km",
            "upper_km",
            "midpoint_km",
            "pairs",
            "value",
            "p_value",
            "significant",
            "degenerate",
        ])
        .map_err(csv_err)?;
    }
    for b in bins {
        out.serialize(CurveRow {
            bin: b.bin,
            lower_km: b.lower_km,
            upper_km: b.upper_km,
            midpoint_km: b.midpoint_km,
            pairs: b.pairs,
            value: b.value,
            p_value: b.p_value,
            significant: b.significant,
            degenerate: b.degenerate.map(|d| d.to_string()),
        })
        .map_err(csv_err)?;
    }

    flush(&mut out)
}

/// Writes a single week's result (totals, curve and lengths) as JSON.
///
/// # Errors
///
/// Returns [`IngestError::Json`] if serialization fails.
pub fn write_curve_json(writer: impl Write, week: &WeekResult) -> Result<(), IngestError> {
    serde_json::to_writer_pretty(writer, week)?;
    Ok(())
}

/// Writes the whole weekly series, curves included, as JSON.
///
/// # Errors
///
/// Returns [`IngestError::Json`] if serialization fails.
pub fn write_series_json(writer: impl Write, series: &WeeklySeries) -> Result<(), IngestError> {
    serde_json::to_writer_pretty(writer, series)?;
    Ok(())
}

/// Writes excluded identities as `fips,reason`.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_exclusions(writer: impl Write, gaps: &[DataGap]) -> Result<(), IngestError> {
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |e| IngestError::csv("<writer>", e);

    out.write_record(["fips", "reason"]).map_err(csv_err)?;
    for gap in gaps {
        let reason = gap.reason.to_string();
        out.write_record([gap.fips.as_str(), reason.as_str()])
            .map_err(csv_err)?;
    }

    flush(&mut out)
}

#[derive(Serialize)]
struct BinSummaryRow {
    bin: usize,
    lower_km: f64,
    upper_km: f64,
    midpoint_km: f64,
    pairs: usize,
}

/// Writes the number of ordered pairs per distance bin.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_corpus_summary(
    writer: impl Write,
    binner: &DistanceBinner,
    corpus: &PairwiseCorpus,
) -> Result<(), IngestError> {
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |e| IngestError::csv("<writer>", e);

    for (bin, pairs) in corpus.counts_per_bin().into_iter().enumerate() {
        let lower_km = binner.lower(bin).unwrap_or(0.0);
        let upper_km = binner.upper(bin).unwrap_or(lower_km);
        out.serialize(BinSummaryRow {
            bin,
            lower_km,
            upper_km,
            midpoint_km: (lower_km + upper_km) / 2.0,
            pairs,
        })
        .map_err(csv_err)?;
    }

    flush(&mut out)
}

#[derive(Serialize)]
struct PairRow<'a> {
    origin: &'a str,
    destination: &'a str,
    distance_km: f64,
    bin: usize,
}

/// Writes every ordered pair of the corpus with its distance and bin.
///
/// # Errors
///
/// Returns [`IngestError`] if writing fails.
pub fn write_corpus_pairs(
    writer: impl Write,
    index: &GeoIndex,
    corpus: &PairwiseCorpus,
) -> Result<(), IngestError> {
    let mut out = csv::Writer::from_writer(writer);
    let csv_err = |e| IngestError::csv("<writer>", e);

    for pair in corpus.all_pairs() {
        let (Some(origin), Some(destination)) =
            (index.county(pair.origin), index.county(pair.destination))
        else {
            continue;
        };
        out.serialize(PairRow {
            origin: &origin.fips,
            destination: &destination.fips,
            distance_km: pair.distance_km,
            bin: pair.bin,
        })
        .map_err(csv_err)?;
    }

    flush(&mut out)
}
