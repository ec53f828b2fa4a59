//! Weekly batch over a contiguous range of weeks.
//!
//! Weeks are independent: each one is computed on a rayon worker from the
//! shared read-only inputs and produces an immutable [`WeekResult`]. The
//! results are merged by week index afterwards. A week that cannot be
//! computed is recorded with its status and never aborts the batch.

use std::ops::RangeInclusive;
use std::sync::Arc;

use covid_corr_analytics_models::{CorrelationLength, WeekResult, WeekStatus, WeeklySeries};
use rayon::prelude::*;

use crate::estimator::CorrelationEstimator;
use crate::progress::ProgressCallback;
use crate::solver::CorrelationLengthSolver;

/// Runs the estimator and solver for every week in a range.
#[derive(Debug, Clone, Copy)]
pub struct WeeklyBatchRunner<'a> {
    estimator: CorrelationEstimator<'a>,
    solver: CorrelationLengthSolver,
    p_threshold: f64,
    min_observed_counties: usize,
    first_week: Option<u32>,
    last_week: Option<u32>,
}

impl<'a> WeeklyBatchRunner<'a> {
    /// Creates a runner over every week present in the signal table, with
    /// no warm-up minimum.
    #[must_use]
    pub const fn new(
        estimator: CorrelationEstimator<'a>,
        solver: CorrelationLengthSolver,
        p_threshold: f64,
    ) -> Self {
        Self {
            estimator,
            solver,
            p_threshold,
            min_observed_counties: 0,
            first_week: None,
            last_week: None,
        }
    }

    /// Weeks with fewer observed counties are recorded as skipped.
    #[must_use]
    pub const fn with_min_observed_counties(mut self, min: usize) -> Self {
        self.min_observed_counties = min;
        self
    }

    /// Restricts the batch to `first..=last`. `None` ends default to the
    /// first or last week with data.
    #[must_use]
    pub const fn with_week_range(mut self, first: Option<u32>, last: Option<u32>) -> Self {
        self.first_week = first;
        self.last_week = last;
        self
    }

    /// The inclusive week range the batch covers, or `None` if the signal
    /// table is empty and no explicit range was given.
    #[must_use]
    pub fn week_range(&self) -> Option<RangeInclusive<u32>> {
        let signals = self.estimator.signals();
        let first = self.first_week.or_else(|| signals.first_week())?;
        let last = self.last_week.or_else(|| signals.last_week())?;
        Some(first..=last)
    }

    /// Computes every week in the range.
    #[must_use]
    pub fn run(&self, progress: &Arc<dyn ProgressCallback>) -> WeeklySeries {
        let weeks: Vec<u32> = self.week_range().map(Iterator::collect).unwrap_or_default();

        log::info!(
            "Running {} weeks ({} bins, p < {})",
            weeks.len(),
            self.estimator.binner().len(),
            self.p_threshold
        );
        progress.set_total(weeks.len() as u64);
        progress.set_message("Computing weekly correlation".to_string());

        let mut results: Vec<WeekResult> = weeks
            .par_iter()
            .map(|&week| {
                let result = self.run_week(week);
                progress.inc(1);
                result
            })
            .collect();
        results.sort_by_key(|r| r.week);

        let series = WeeklySeries {
            bin_upper_bounds_km: self.estimator.binner().upper_bounds().to_vec(),
            p_threshold: self.p_threshold,
            weeks: results,
        };

        let computed = series.computed_weeks();
        log::info!("Computed {computed}/{} weeks", series.weeks.len());
        progress.finish(format!("Computed {computed}/{} weeks", series.weeks.len()));

        series
    }

    /// Computes a single week with the runner's threshold and warm-up
    /// rule.
    #[must_use]
    pub fn run_week(&self, week: u32) -> WeekResult {
        let signals = self.estimator.signals();
        let observed_counties = signals.observed_counties(week);
        let totals = signals.week_totals(week);
        let previous = week.checked_sub(1).and_then(|w| signals.week_totals(w));

        let mut result = WeekResult {
            week,
            start: signals.week_start(week),
            total_cases: totals.as_ref().map(|t| t.cases),
            total_deaths: totals.as_ref().map(|t| t.deaths),
            case_delta: totals
                .as_ref()
                .zip(previous.as_ref())
                .map(|(now, before)| now.cases - before.cases),
            observed_counties,
            status: WeekStatus::Computed,
            curve: None,
            length: CorrelationLength::default(),
        };

        if observed_counties < self.min_observed_counties {
            log::debug!(
                "Week {week}: skipped, {observed_counties} counties observed (need {})",
                self.min_observed_counties
            );
            result.status = WeekStatus::Skipped {
                observed_counties,
                required: self.min_observed_counties,
            };
            return result;
        }

        let curve = self.estimator.compute(week, self.p_threshold);
        result.length = self.solver.solve(&curve);

        if curve.is_all_undefined() {
            log::warn!("Week {week}: every distance bin is degenerate");
            result.status = WeekStatus::AllBinsUndefined;
        } else {
            if let Some(reason) = result.length.interpolation_failure {
                log::debug!("Week {week}: no interpolated correlation length ({reason})");
            }
            if let Some(reason) = result.length.significance_failure {
                log::debug!("Week {week}: no significance correlation length ({reason})");
            }
        }

        result.curve = Some(curve);
        result
    }
}
