//! End-to-end wiring from raw inputs to correlation results.
//!
//! [`Analysis::prepare`] validates the configuration, builds the county
//! universe, the distance partition, the pairwise corpus and the signal
//! table once. The prepared analysis then answers single-week and batch
//! queries without rebuilding anything.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use covid_corr_analytics_models::{AnalysisConfig, WeekResult, WeeklySeries};
use covid_corr_geography_models::{CountyRecord, DataGap};
use covid_corr_signal::{DailyRecord, SignalOptions, WeeklySignalTable};
use covid_corr_spatial::{DistanceBinner, GeoIndex, PairwiseCorpus};

use crate::AnalysisError;
use crate::batch::WeeklyBatchRunner;
use crate::estimator::CorrelationEstimator;
use crate::progress::ProgressCallback;
use crate::solver::CorrelationLengthSolver;

/// A fully prepared analysis run.
#[derive(Debug, Clone)]
pub struct Analysis {
    config: AnalysisConfig,
    index: GeoIndex,
    binner: DistanceBinner,
    corpus: PairwiseCorpus,
    signals: WeeklySignalTable,
    county_exclusions: Vec<DataGap>,
}

impl Analysis {
    /// Validates `config` and builds every shared structure.
    ///
    /// `population` overrides the population column of the county
    /// reference rows where both are present. Only counties admitted to
    /// the county universe contribute signals.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError`] for an invalid configuration. Data
    /// problems never fail preparation; they are recorded as exclusions.
    pub fn prepare(
        config: AnalysisConfig,
        counties: impl IntoIterator<Item = CountyRecord>,
        records: impl IntoIterator<Item = DailyRecord>,
        population: &BTreeMap<String, u64>,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;

        let binner = match &config.bin_upper_bounds_km {
            Some(bounds) => DistanceBinner::new(bounds.clone())?,
            None => DistanceBinner::reference(),
        };

        let counties = counties.into_iter().map(|mut record| {
            if let Some(&pop) = population.get(&record.fips) {
                record.population = Some(pop);
            }
            record
        });
        let (index, county_exclusions) = GeoIndex::from_records(counties, config.min_population);

        let corpus = PairwiseCorpus::build(&index, &binner);
        log::info!(
            "Pairwise corpus: {} ordered pairs within {} km",
            corpus.len(),
            corpus.cutoff_km()
        );

        let included: BTreeMap<String, u64> = index
            .counties()
            .iter()
            .map(|c| (c.fips.clone(), c.population))
            .collect();
        let signals = WeeklySignalTable::build(
            records,
            &included,
            SignalOptions {
                anchor: config.anchor_date,
                bucket_days: config.bucket_days,
                min_population: config.min_population,
            },
        )?;

        Ok(Self {
            config,
            index,
            binner,
            corpus,
            signals,
            county_exclusions,
        })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The county universe.
    #[must_use]
    pub const fn index(&self) -> &GeoIndex {
        &self.index
    }

    /// The distance partition.
    #[must_use]
    pub const fn binner(&self) -> &DistanceBinner {
        &self.binner
    }

    /// All county pairs within the cutoff.
    #[must_use]
    pub const fn corpus(&self) -> &PairwiseCorpus {
        &self.corpus
    }

    /// The weekly signal table.
    #[must_use]
    pub const fn signals(&self) -> &WeeklySignalTable {
        &self.signals
    }

    /// Estimator over the prepared inputs.
    #[must_use]
    pub const fn estimator(&self) -> CorrelationEstimator<'_> {
        CorrelationEstimator::new(&self.index, &self.corpus, &self.binner, &self.signals)
    }

    /// Solver with the configured root tolerance.
    #[must_use]
    pub const fn solver(&self) -> CorrelationLengthSolver {
        CorrelationLengthSolver::new(self.config.root_tolerance)
    }

    /// Curve and correlation lengths of one week, using the single-week
    /// significance threshold. The warm-up minimum does not apply.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::UnknownWeek`] if no county has a signal in
    /// `week`.
    pub fn single_week(&self, week: u32) -> Result<WeekResult, AnalysisError> {
        if self.signals.observed_counties(week) == 0 {
            return Err(AnalysisError::UnknownWeek { week });
        }
        let runner = WeeklyBatchRunner::new(
            self.estimator(),
            self.solver(),
            self.config.single_week_p_threshold,
        );
        Ok(runner.run_week(week))
    }

    /// Runs the batch over the configured week range with the batch
    /// significance threshold and warm-up minimum.
    #[must_use]
    pub fn run_batch(&self, progress: &Arc<dyn ProgressCallback>) -> WeeklySeries {
        WeeklyBatchRunner::new(
            self.estimator(),
            self.solver(),
            self.config.batch_p_threshold,
        )
        .with_min_observed_counties(self.config.min_observed_counties)
        .with_week_range(self.config.first_week, self.config.last_week)
        .run(progress)
    }

    /// Every excluded identity with its reason, ordered by identity.
    ///
    /// Counties left out of the universe are reported with the reason they
    /// were rejected there, not again as missing from the signal join.
    #[must_use]
    pub fn exclusions(&self) -> Vec<DataGap> {
        let rejected: BTreeSet<&str> = self
            .county_exclusions
            .iter()
            .map(|g| g.fips.as_str())
            .collect();

        let mut all: Vec<DataGap> = self
            .county_exclusions
            .iter()
            .chain(
                self.signals
                    .exclusions()
                    .iter()
                    .filter(|g| !rejected.contains(g.fips.as_str())),
            )
            .cloned()
            .collect();
        all.sort_by(|a, b| a.fips.cmp(&b.fips).then(a.reason.cmp(&b.reason)));
        all.dedup();
        all
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use covid_corr_analytics_models::{ConfigError, RootNotFound, WeekStatus};
    use covid_corr_geography_models::{GapReason, Region};
    use covid_corr_spatial::EARTH_RADIUS_KM;

    use super::*;
    use crate::progress::null_progress;

    const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 22).unwrap()
    }

    fn record(fips: &str, lon: f64, region: Region, population: u64) -> CountyRecord {
        CountyRecord {
            fips: fips.to_string(),
            name: format!("County {fips}"),
            region,
            land_area_sq_mi: Some(500.0),
            centroid_lon: Some(lon),
            centroid_lat: Some(0.0),
            population: Some(population),
        }
    }

    /// Five counties on the equator at 0, 1, 2, 5 and 10 degrees east,
    /// plus two that never make it into the universe.
    fn counties() -> Vec<CountyRecord> {
        vec![
            record("48001", 0.0, Region::South, 70_000),
            record("48003", 1.0, Region::South, 70_000),
            record("48005", 2.0, Region::South, 70_000),
            record("48007", 5.0, Region::South, 70_000),
            record("48009", 10.0, Region::South, 70_000),
            record("48011", 0.5, Region::South, 4_000),
            record("72001", 0.5, Region::Unknown, 70_000),
        ]
    }

    /// One record per county and week. Week k reports 7 * k * c cases,
    /// so the per-day fraction grows by c / 70,000 every week and X_T is
    /// constant over time.
    fn daily_records() -> Vec<DailyRecord> {
        let scale = [("48001", 10), ("48003", 11), ("48005", 12), ("48007", 30), ("48009", 100)];
        let mut rows = Vec::new();
        for week in 1_u32..=3 {
            let date = anchor()
                .checked_add_days(Days::new(7 * u64::from(week - 1)))
                .unwrap();
            for (fips, c) in scale {
                rows.push(DailyRecord {
                    date,
                    fips: fips.to_string(),
                    cases: 7 * i64::from(week) * c,
                    deaths: i64::from(week),
                });
            }
            rows.push(DailyRecord {
                date,
                fips: "72001".to_string(),
                cases: 1_000,
                deaths: 0,
            });
        }
        rows
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            anchor_date: anchor(),
            bin_upper_bounds_km: Some(vec![
                2.5 * KM_PER_DEGREE,
                5.5 * KM_PER_DEGREE,
                10.5 * KM_PER_DEGREE,
            ]),
            min_observed_counties: 5,
            batch_p_threshold: 0.4,
            single_week_p_threshold: 0.4,
            ..AnalysisConfig::default()
        }
    }

    fn prepare() -> Analysis {
        Analysis::prepare(config(), counties(), daily_records(), &BTreeMap::new()).unwrap()
    }

    #[test]
    fn prepares_universe_corpus_and_signals() {
        let analysis = prepare();
        assert_eq!(analysis.index().len(), 5);
        assert_eq!(analysis.corpus().counts_per_bin(), vec![6, 8, 6]);
        assert_eq!(analysis.signals().weeks().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(analysis.signals().observed_counties(2), 5);
    }

    #[test]
    fn correlation_decays_and_significance_length_is_bracketed() {
        let analysis = prepare();
        let series = analysis.run_batch(&null_progress());

        assert_eq!(series.weeks.len(), 3);
        assert_eq!(series.computed_weeks(), 3);

        let midpoints = analysis.binner().midpoints();
        for week in &series.weeks {
            let curve = week.curve.as_ref().unwrap();
            let nearest = curve.bins[0].value.unwrap();
            let farthest = curve.bins[2].value.unwrap();
            assert!((nearest + 0.5).abs() < 1e-9);
            assert!(nearest > farthest);

            let xi = week.length.significance_km.unwrap();
            assert!(xi >= midpoints[1] && xi <= midpoints[2]);
            assert!((xi - 4.0 * KM_PER_DEGREE).abs() < 1e-9);

            assert_eq!(week.length.interpolation_km, None);
            assert_eq!(
                week.length.interpolation_failure,
                Some(RootNotFound::NoSignChange)
            );
        }

        let first = &series.weeks[0];
        assert_eq!(first.total_cases, Some(7 * 163));
        assert_eq!(first.case_delta, None);
        assert_eq!(series.weeks[1].case_delta, Some(7 * 163));
        assert_eq!(first.status, WeekStatus::Computed);
    }

    #[test]
    fn bin_significance_follows_threshold() {
        let analysis = prepare();
        let week = analysis.single_week(2).unwrap();
        let curve = week.curve.unwrap();

        let p: Vec<f64> = curve.bins.iter().map(|b| b.p_value.unwrap()).collect();
        assert!((p[0] - 0.3125).abs() < 1e-6);
        assert!(p[1] > 0.4);
        assert!(p[2] < 0.05);
        assert_eq!(
            curve.bins.iter().map(|b| b.significant).collect::<Vec<_>>(),
            vec![Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn single_week_rejects_weeks_without_data() {
        let analysis = prepare();
        assert!(matches!(
            analysis.single_week(40),
            Err(AnalysisError::UnknownWeek { week: 40 })
        ));
    }

    #[test]
    fn exclusions_report_the_county_rejection_reason() {
        let analysis = prepare();
        let reasons: Vec<(String, GapReason)> = analysis
            .exclusions()
            .into_iter()
            .map(|g| (g.fips, g.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("48011".to_string(), GapReason::BelowPopulationFloor),
                ("72001".to_string(), GapReason::UnknownRegion),
            ]
        );
    }

    #[test]
    fn population_table_overrides_reference_rows() {
        let population = BTreeMap::from([("48011".to_string(), 40_000)]);
        let analysis =
            Analysis::prepare(config(), counties(), daily_records(), &population).unwrap();
        assert_eq!(analysis.index().len(), 6);
        assert_eq!(analysis.index().get("48011").map(|c| c.population), Some(40_000));
    }

    #[test]
    fn invalid_config_fails_before_any_data_is_read() {
        let config = AnalysisConfig {
            batch_p_threshold: 1.5,
            ..AnalysisConfig::default()
        };
        let result = Analysis::prepare(config, counties(), daily_records(), &BTreeMap::new());
        assert!(matches!(
            result,
            Err(AnalysisError::Config(ConfigError::InvalidThreshold { .. }))
        ));
    }
}
