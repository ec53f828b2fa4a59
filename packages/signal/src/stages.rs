//! Pure transformation stages from raw daily records to weekly signals.
//!
//! Each stage consumes the previous stage's output and never mutates its
//! input in place:
//!
//! 1. [`resolve_identities`]: every surviving record has a 5-digit FIPS.
//! 2. [`drop_before_anchor`]: every surviving record is dated on or after
//!    the anchor.
//! 3. [`aggregate_buckets`]: one sum per (county, bucket).
//! 4. [`attach_population`]: every surviving county has a population at or
//!    above the floor.
//! 5. [`first_differences`]: one [`WeeklySignal`] per (county, bucket),
//!    ordered by county then bucket.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use covid_corr_geography_models::fips::normalize_county_fips;
use covid_corr_geography_models::{DataGap, GapReason};

use crate::{DailyRecord, SignalOptions, WeeklySignal};

/// A daily record with a normalized identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    /// Five-digit county FIPS code.
    pub fips: String,
    /// Reporting date.
    pub date: NaiveDate,
    /// New cases.
    pub cases: i64,
    /// New deaths.
    pub deaths: i64,
}

/// Case and death sums for one (county, bucket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketSums {
    /// Summed cases.
    pub cases: i64,
    /// Summed deaths.
    pub deaths: i64,
    /// Number of daily records contributing.
    pub records: u32,
}

/// Bucket sums of one county together with its population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatedCounty {
    /// County population.
    pub population: u64,
    /// Sums per bucket, ascending by bucket index.
    pub buckets: Vec<(u32, BucketSums)>,
}

/// Normalizes identities, dropping records whose identity cannot be
/// resolved. Each distinct unresolvable identity is reported once.
#[must_use]
pub fn resolve_identities(
    records: impl IntoIterator<Item = DailyRecord>,
) -> (Vec<ResolvedRecord>, Vec<DataGap>) {
    let mut resolved = Vec::new();
    let mut unresolved = BTreeSet::new();

    for record in records {
        match normalize_county_fips(&record.fips) {
            Some(fips) => resolved.push(ResolvedRecord {
                fips,
                date: record.date,
                cases: record.cases,
                deaths: record.deaths,
            }),
            None => {
                unresolved.insert(record.fips);
            }
        }
    }

    let gaps = unresolved
        .into_iter()
        .map(|raw| DataGap::new(raw, GapReason::UnresolvableIdentity))
        .collect();

    (resolved, gaps)
}

/// Drops records dated before `anchor`, returning the survivors and the
/// number dropped.
#[must_use]
pub fn drop_before_anchor(
    records: Vec<ResolvedRecord>,
    anchor: NaiveDate,
) -> (Vec<ResolvedRecord>, usize) {
    let before = records.len();
    let kept: Vec<_> = records.into_iter().filter(|r| r.date >= anchor).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// 1-based bucket index: `ceil((date - anchor + 1) / bucket_days)`.
///
/// Returns `None` for dates before the anchor or a zero bucket width.
#[must_use]
pub fn bucket_index(date: NaiveDate, anchor: NaiveDate, bucket_days: u32) -> Option<u32> {
    if bucket_days == 0 {
        return None;
    }
    let days = u32::try_from((date - anchor).num_days()).ok()?;
    Some(days / bucket_days + 1)
}

/// Sums cases and deaths per (county, bucket).
#[must_use]
pub fn aggregate_buckets(
    records: &[ResolvedRecord],
    anchor: NaiveDate,
    bucket_days: u32,
) -> BTreeMap<(String, u32), BucketSums> {
    let mut sums: BTreeMap<(String, u32), BucketSums> = BTreeMap::new();

    for record in records {
        let Some(bucket) = bucket_index(record.date, anchor, bucket_days) else {
            continue;
        };
        let entry = sums.entry((record.fips.clone(), bucket)).or_default();
        entry.cases += record.cases;
        entry.deaths += record.deaths;
        entry.records += 1;
    }

    sums
}

/// Joins bucket sums against population, excluding counties with missing
/// or zero population and counties below `min_population`.
#[must_use]
pub fn attach_population(
    sums: BTreeMap<(String, u32), BucketSums>,
    population: &BTreeMap<String, u64>,
    min_population: u64,
) -> (BTreeMap<String, PopulatedCounty>, Vec<DataGap>) {
    let mut counties: BTreeMap<String, PopulatedCounty> = BTreeMap::new();
    let mut gaps: BTreeMap<String, GapReason> = BTreeMap::new();

    for ((fips, bucket), sum) in sums {
        if gaps.contains_key(&fips) {
            continue;
        }
        if let Some(county) = counties.get_mut(&fips) {
            county.buckets.push((bucket, sum));
            continue;
        }

        match population.get(&fips).copied() {
            None | Some(0) => {
                gaps.insert(fips, GapReason::MissingPopulation);
            }
            Some(pop) if pop < min_population => {
                gaps.insert(fips, GapReason::BelowPopulationFloor);
            }
            Some(pop) => {
                counties.insert(
                    fips,
                    PopulatedCounty {
                        population: pop,
                        buckets: vec![(bucket, sum)],
                    },
                );
            }
        }
    }

    let gaps = gaps
        .into_iter()
        .map(|(fips, reason)| DataGap::new(fips, reason))
        .collect();

    (counties, gaps)
}

/// Normalizes by population and first-differences within each county.
///
/// The predecessor of a county's first observed bucket is zero, so its
/// X_T equals its fraction. Later buckets difference against the previous
/// observed bucket of the same county.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn first_differences(
    counties: BTreeMap<String, PopulatedCounty>,
    options: &SignalOptions,
) -> Vec<WeeklySignal> {
    let width = f64::from(options.bucket_days);
    let mut signals = Vec::new();

    for (fips, county) in counties {
        let population = county.population as f64;
        let mut previous = 0.0;

        for (week, sum) in county.buckets {
            let cases_per_day = sum.cases as f64 / width;
            let deaths_per_day = sum.deaths as f64 / width;
            let fraction = cases_per_day / population;

            signals.push(WeeklySignal {
                fips: fips.clone(),
                week,
                cases: sum.cases,
                deaths: sum.deaths,
                cases_per_day,
                deaths_per_day,
                population: county.population,
                fraction,
                delta: fraction - previous,
            });
            previous = fraction;
        }
    }

    signals
}
