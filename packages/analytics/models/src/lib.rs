#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration and result types of the spatial correlation analysis.
//!
//! Undefined statistics are always `None` together with the reason they
//! are undefined; no type in this crate encodes "no data" as zero.

pub mod config;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use config::{AnalysisConfig, ConfigError};

/// Why a distance bin has no correlation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DegenerateBin {
    /// Fewer than two pairs had a signal at both ends.
    #[error("only {pairs} pair(s) with a signal at both ends")]
    InsufficientPairs {
        /// Number of contributing pairs.
        pairs: usize,
    },

    /// One of the two signal sequences is constant.
    #[error("zero variance in the signal sequence")]
    ZeroVariance,
}

/// Why a correlation length could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RootNotFound {
    /// Fewer than two bins carry a usable value.
    #[error("only {points} usable bin(s)")]
    InsufficientPoints {
        /// Number of usable bins.
        points: usize,
    },

    /// The interpolated curve never changes sign.
    #[error("correlation curve does not cross zero")]
    NoSignChange,

    /// The solver stopped but the curve is not close enough to zero.
    #[error("residual {residual} at the root exceeds tolerance")]
    ToleranceNotMet {
        /// |C| at the returned point.
        residual: f64,
    },

    /// The bracketed solver ran out of iterations.
    #[error("root solver did not converge")]
    NoConvergence,

    /// Every bin with a significance flag is significant.
    #[error("correlation stays significant across all bins")]
    NoSignificanceTransition,
}

/// Correlation statistics of one distance bin in one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinCorrelation {
    /// Bin index (0-based, increasing distance).
    pub bin: usize,
    /// Lower bound in km (exclusive except for bin 0).
    pub lower_km: f64,
    /// Upper bound in km (inclusive).
    pub upper_km: f64,
    /// Bin center in km.
    pub midpoint_km: f64,
    /// Pairs with a signal at both ends.
    pub pairs: usize,
    /// C(r, T): population-normalized Pearson coefficient.
    pub value: Option<f64>,
    /// Two-sided Spearman p-value.
    pub p_value: Option<f64>,
    /// Whether `p_value` is below the threshold.
    pub significant: Option<bool>,
    /// Why `value` is undefined.
    pub degenerate: Option<DegenerateBin>,
}

/// C(r, T) for every distance bin of one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationCurve {
    /// Week index.
    pub week: u32,
    /// p-value threshold used for the significance flags.
    pub p_threshold: f64,
    /// One entry per bin, in bin order.
    pub bins: Vec<BinCorrelation>,
}

impl CorrelationCurve {
    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether the curve has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// `(midpoint, value)` for every bin with a defined value.
    #[must_use]
    pub fn defined_points(&self) -> Vec<(f64, f64)> {
        self.bins
            .iter()
            .filter_map(|b| b.value.map(|v| (b.midpoint_km, v)))
            .collect()
    }

    /// Values in bin order.
    #[must_use]
    pub fn values(&self) -> Vec<Option<f64>> {
        self.bins.iter().map(|b| b.value).collect()
    }

    /// Whether no bin has a defined value.
    #[must_use]
    pub fn is_all_undefined(&self) -> bool {
        self.bins.iter().all(|b| b.value.is_none())
    }
}

/// Both correlation-length estimates for one week.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationLength {
    /// Zero crossing of the interpolated curve, in km.
    pub interpolation_km: Option<f64>,
    /// Why `interpolation_km` is undefined.
    pub interpolation_failure: Option<RootNotFound>,
    /// Midpoint of the first non-significant bin, in km.
    pub significance_km: Option<f64>,
    /// Why `significance_km` is undefined.
    pub significance_failure: Option<RootNotFound>,
}

impl CorrelationLength {
    /// Builds from the two solver outcomes.
    #[must_use]
    pub fn from_results(
        interpolation: Result<f64, RootNotFound>,
        significance: Result<f64, RootNotFound>,
    ) -> Self {
        Self {
            interpolation_km: interpolation.ok(),
            interpolation_failure: interpolation.err(),
            significance_km: significance.ok(),
            significance_failure: significance.err(),
        }
    }
}

/// Outcome of one week in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WeekStatus {
    /// Curve and lengths computed (either length may still be undefined).
    Computed,
    /// Too few counties observed; nothing computed.
    Skipped {
        /// Counties with a signal this week.
        observed_counties: usize,
        /// Minimum required.
        required: usize,
    },
    /// Every bin was degenerate; lengths undefined, curve retained.
    AllBinsUndefined,
}

/// One row of the weekly time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekResult {
    /// Week index.
    pub week: u32,
    /// First calendar day of the week.
    pub start: Option<NaiveDate>,
    /// Cases summed over included counties.
    pub total_cases: Option<i64>,
    /// Deaths summed over included counties.
    pub total_deaths: Option<i64>,
    /// `total_cases` minus the previous week's total.
    pub case_delta: Option<i64>,
    /// Counties with a signal this week.
    pub observed_counties: usize,
    /// What happened to this week.
    pub status: WeekStatus,
    /// Per-bin correlations, absent for skipped weeks.
    pub curve: Option<CorrelationCurve>,
    /// Correlation-length estimates.
    pub length: CorrelationLength,
}

/// The assembled batch output, ordered by week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySeries {
    /// Upper bounds of the distance bins in km.
    pub bin_upper_bounds_km: Vec<f64>,
    /// p-value threshold used for the significance flags.
    pub p_threshold: f64,
    /// One entry per week in the configured range, ascending.
    pub weeks: Vec<WeekResult>,
}

impl WeeklySeries {
    /// Result for a given week index.
    #[must_use]
    pub fn week(&self, week: u32) -> Option<&WeekResult> {
        self.weeks
            .binary_search_by_key(&week, |w| w.week)
            .ok()
            .map(|i| &self.weeks[i])
    }

    /// Number of weeks with a computed curve.
    #[must_use]
    pub fn computed_weeks(&self) -> usize {
        self.weeks
            .iter()
            .filter(|w| w.status == WeekStatus::Computed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(index: usize, value: Option<f64>) -> BinCorrelation {
        BinCorrelation {
            bin: index,
            lower_km: 0.0,
            upper_km: 10.0,
            midpoint_km: 5.0 + 10.0 * f64::from(u32::try_from(index).unwrap()),
            pairs: 4,
            value,
            p_value: None,
            significant: None,
            degenerate: value.map_or(Some(DegenerateBin::ZeroVariance), |_| None),
        }
    }

    #[test]
    fn defined_points_skip_undefined_bins() {
        let curve = CorrelationCurve {
            week: 3,
            p_threshold: 0.01,
            bins: vec![bin(0, Some(0.5)), bin(1, None), bin(2, Some(-0.1))],
        };
        assert_eq!(curve.defined_points(), vec![(5.0, 0.5), (25.0, -0.1)]);
        assert_eq!(curve.values(), vec![Some(0.5), None, Some(-0.1)]);
        assert!(!curve.is_all_undefined());
    }

    #[test]
    fn all_undefined_curve() {
        let curve = CorrelationCurve {
            week: 1,
            p_threshold: 0.01,
            bins: vec![bin(0, None), bin(1, None)],
        };
        assert!(curve.is_all_undefined());
        assert!(curve.defined_points().is_empty());
    }

    #[test]
    fn length_keeps_failure_reasons() {
        let length =
            CorrelationLength::from_results(Err(RootNotFound::NoSignChange), Ok(120.0));
        assert_eq!(length.interpolation_km, None);
        assert_eq!(length.interpolation_failure, Some(RootNotFound::NoSignChange));
        assert_eq!(length.significance_km, Some(120.0));
        assert_eq!(length.significance_failure, None);
    }

    #[test]
    fn degenerate_bin_serializes_with_kind_tag() {
        let json = serde_json::to_string(&DegenerateBin::InsufficientPairs { pairs: 1 }).unwrap();
        assert_eq!(json, r#"{"kind":"insufficient_pairs","pairs":1}"#);
    }
}
