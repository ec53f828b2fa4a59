//! Lookup structure over the assembled weekly signals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use covid_corr_geography_models::DataGap;
use serde::{Deserialize, Serialize};

use crate::stages::{
    aggregate_buckets, attach_population, drop_before_anchor, first_differences,
    resolve_identities,
};
use crate::{DailyRecord, SignalError, SignalOptions, WeeklySignal};

/// Aggregate counts over every included county for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekTotals {
    /// 1-based bucket index.
    pub week: u32,
    /// First calendar day of the bucket.
    pub start: Option<NaiveDate>,
    /// Cases summed over included counties.
    pub cases: i64,
    /// Deaths summed over included counties.
    pub deaths: i64,
    /// Number of counties with a signal in this bucket.
    pub counties: usize,
}

/// Signals indexed by bucket and then by county FIPS.
#[derive(Debug, Clone)]
pub struct WeeklySignalTable {
    options: SignalOptions,
    by_week: BTreeMap<u32, BTreeMap<String, WeeklySignal>>,
    exclusions: Vec<DataGap>,
    dropped_before_anchor: usize,
}

impl WeeklySignalTable {
    /// Runs every construction stage over the raw daily stream.
    ///
    /// `population` maps 5-digit FIPS codes to a single population figure.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the options are invalid.
    pub fn build(
        records: impl IntoIterator<Item = DailyRecord>,
        population: &BTreeMap<String, u64>,
        options: SignalOptions,
    ) -> Result<Self, SignalError> {
        options.validate()?;

        let (resolved, mut exclusions) = resolve_identities(records);
        let (resolved, dropped_before_anchor) = drop_before_anchor(resolved, options.anchor);
        let sums = aggregate_buckets(&resolved, options.anchor, options.bucket_days);
        let (counties, population_gaps) =
            attach_population(sums, population, options.min_population);
        exclusions.extend(population_gaps);

        let signals = first_differences(counties, &options);

        if !exclusions.is_empty() {
            log::warn!(
                "{} county identities excluded from the signal table",
                exclusions.len()
            );
        }
        if dropped_before_anchor > 0 {
            log::debug!(
                "Dropped {dropped_before_anchor} records dated before {}",
                options.anchor
            );
        }

        let mut table = Self::from_signals(signals, options);
        table.exclusions = exclusions;
        table.dropped_before_anchor = dropped_before_anchor;

        log::info!(
            "Signal table: {} buckets, {} county-bucket signals",
            table.by_week.len(),
            table.len()
        );

        Ok(table)
    }

    /// Assembles a table from precomputed signals. Later duplicates of a
    /// (county, bucket) key replace earlier ones.
    #[must_use]
    pub fn from_signals(
        signals: impl IntoIterator<Item = WeeklySignal>,
        options: SignalOptions,
    ) -> Self {
        let mut by_week: BTreeMap<u32, BTreeMap<String, WeeklySignal>> = BTreeMap::new();
        for signal in signals {
            by_week
                .entry(signal.week)
                .or_default()
                .insert(signal.fips.clone(), signal);
        }

        Self {
            options,
            by_week,
            exclusions: Vec::new(),
            dropped_before_anchor: 0,
        }
    }

    /// X_T for a county in a bucket, or `None` if the county has no
    /// observation there.
    #[must_use]
    pub fn signal(&self, fips: &str, week: u32) -> Option<f64> {
        self.observation(fips, week).map(|s| s.delta)
    }

    /// Full signal record for a county in a bucket.
    #[must_use]
    pub fn observation(&self, fips: &str, week: u32) -> Option<&WeeklySignal> {
        self.by_week.get(&week)?.get(fips)
    }

    /// Signals of one bucket looked up in the order of `fips`.
    ///
    /// Used to build a dense column aligned with the county index so the
    /// pairwise join is a plain slice lookup.
    pub fn column<'a>(&self, week: u32, fips: impl IntoIterator<Item = &'a str>) -> Vec<Option<f64>> {
        let signals = self.by_week.get(&week);
        fips.into_iter()
            .map(|f| signals.and_then(|s| s.get(f)).map(|s| s.delta))
            .collect()
    }

    /// Bucket indices present, ascending.
    pub fn weeks(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_week.keys().copied()
    }

    /// Smallest bucket index present.
    #[must_use]
    pub fn first_week(&self) -> Option<u32> {
        self.by_week.keys().next().copied()
    }

    /// Largest bucket index present.
    #[must_use]
    pub fn last_week(&self) -> Option<u32> {
        self.by_week.keys().next_back().copied()
    }

    /// Number of counties with a signal in `week`.
    #[must_use]
    pub fn observed_counties(&self, week: u32) -> usize {
        self.by_week.get(&week).map_or(0, BTreeMap::len)
    }

    /// Aggregate counts for `week`, or `None` if no county was observed.
    #[must_use]
    pub fn week_totals(&self, week: u32) -> Option<WeekTotals> {
        let signals = self.by_week.get(&week)?;
        Some(WeekTotals {
            week,
            start: self.week_start(week),
            cases: signals.values().map(|s| s.cases).sum(),
            deaths: signals.values().map(|s| s.deaths).sum(),
            counties: signals.len(),
        })
    }

    /// First calendar day of bucket `week`.
    #[must_use]
    pub fn week_start(&self, week: u32) -> Option<NaiveDate> {
        self.options.bucket_start(week)
    }

    /// Identities excluded during construction.
    #[must_use]
    pub fn exclusions(&self) -> &[DataGap] {
        &self.exclusions
    }

    /// Number of raw records dated before the anchor.
    #[must_use]
    pub const fn dropped_before_anchor(&self) -> usize {
        self.dropped_before_anchor
    }

    /// Options the table was built with.
    #[must_use]
    pub const fn options(&self) -> &SignalOptions {
        &self.options
    }

    /// Total number of (county, bucket) signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_week.values().map(BTreeMap::len).sum()
    }

    /// Whether the table holds no signals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_week.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use covid_corr_geography_models::GapReason;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn options() -> SignalOptions {
        SignalOptions {
            anchor: date("2020-03-01"),
            bucket_days: 7,
            min_population: 10_000,
        }
    }

    fn daily(d: &str, fips: &str, cases: i64, deaths: i64) -> DailyRecord {
        DailyRecord {
            date: date(d),
            fips: fips.to_string(),
            cases,
            deaths,
        }
    }

    fn population() -> BTreeMap<String, u64> {
        BTreeMap::from([
            ("01001".to_string(), 70_000),
            ("01003".to_string(), 140_000),
            ("01005".to_string(), 5_000),
        ])
    }

    fn table() -> WeeklySignalTable {
        WeeklySignalTable::build(
            vec![
                daily("2020-02-28", "1001", 500, 0),
                daily("2020-03-01", "1001", 35, 1),
                daily("2020-03-04", "1001", 35, 0),
                daily("2020-03-09", "1001", 140, 2),
                daily("2020-03-02", "1003.0", 70, 0),
                daily("2020-03-02", "1005", 70, 0),
                daily("2020-03-02", "1009", 70, 0),
                daily("2020-03-02", "", 70, 0),
            ],
            &population(),
            options(),
        )
        .unwrap()
    }

    #[test]
    fn builds_signals_through_all_stages() {
        let table = table();

        assert_eq!(table.weeks().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(table.observed_counties(1), 2);
        assert_eq!(table.observed_counties(2), 1);
        assert_eq!(table.dropped_before_anchor(), 1);

        let first = table.signal("01001", 1).unwrap();
        assert!((first - 10.0 / 70_000.0).abs() < 1e-15);
        let second = table.signal("01001", 2).unwrap();
        assert!((second - 10.0 / 70_000.0).abs() < 1e-15);

        let other = table.signal("01003", 1).unwrap();
        assert!((other - 10.0 / 140_000.0).abs() < 1e-15);
    }

    #[test]
    fn absent_entries_are_none_not_zero() {
        let table = table();
        assert_eq!(table.signal("01003", 2), None);
        assert_eq!(table.signal("01005", 1), None);
        assert_eq!(table.signal("01001", 9), None);
    }

    #[test]
    fn exclusions_are_retrievable() {
        let table = table();
        let mut reasons: Vec<_> = table
            .exclusions()
            .iter()
            .map(|g| (g.fips.as_str(), g.reason))
            .collect();
        reasons.sort_unstable();
        assert_eq!(
            reasons,
            vec![
                ("", GapReason::UnresolvableIdentity),
                ("01005", GapReason::BelowPopulationFloor),
                ("01009", GapReason::MissingPopulation),
            ]
        );
    }

    #[test]
    fn totals_and_start_dates() {
        let table = table();
        let week1 = table.week_totals(1).unwrap();
        assert_eq!(week1.cases, 140);
        assert_eq!(week1.deaths, 1);
        assert_eq!(week1.counties, 2);
        assert_eq!(week1.start, Some(date("2020-03-01")));
        assert_eq!(table.week_start(2), Some(date("2020-03-08")));
        assert!(table.week_totals(3).is_none());
    }

    #[test]
    fn dense_column_follows_requested_order() {
        let table = table();
        let column = table.column(1, ["01003", "99999", "01001"]);
        assert_eq!(column.len(), 3);
        assert!(column[0].is_some());
        assert!(column[1].is_none());
        assert!(column[2].is_some());
        assert!(table.column(42, ["01001"]).iter().all(Option::is_none));
    }

    #[test]
    fn rejects_zero_bucket_width() {
        let mut opts = options();
        opts.bucket_days = 0;
        assert_eq!(
            WeeklySignalTable::build(Vec::new(), &population(), opts).unwrap_err(),
            SignalError::ZeroBucketWidth
        );
    }
}
