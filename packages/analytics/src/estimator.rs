//! Per-week correlation curve C(r, T).

use covid_corr_analytics_models::{BinCorrelation, CorrelationCurve};
use covid_corr_signal::WeeklySignalTable;
use covid_corr_spatial::{CountyPair, DistanceBinner, GeoIndex, PairwiseCorpus};
use rayon::prelude::*;

use crate::stats::{pearson, spearman};

/// Computes the correlation curve of any week from shared, read-only
/// inputs. Cheap to copy; one estimator serves every batch worker.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationEstimator<'a> {
    index: &'a GeoIndex,
    corpus: &'a PairwiseCorpus,
    binner: &'a DistanceBinner,
    signals: &'a WeeklySignalTable,
}

impl<'a> CorrelationEstimator<'a> {
    /// Creates an estimator. `corpus` must have been built from `index`
    /// and `binner`.
    #[must_use]
    pub const fn new(
        index: &'a GeoIndex,
        corpus: &'a PairwiseCorpus,
        binner: &'a DistanceBinner,
        signals: &'a WeeklySignalTable,
    ) -> Self {
        Self {
            index,
            corpus,
            binner,
            signals,
        }
    }

    /// The distance partition used for the curve.
    #[must_use]
    pub const fn binner(&self) -> &'a DistanceBinner {
        self.binner
    }

    /// The signal table the estimator reads from.
    #[must_use]
    pub const fn signals(&self) -> &'a WeeklySignalTable {
        self.signals
    }

    /// C(r, T) for every bin of `week`. A bin is significant when its
    /// Spearman p-value is below `p_threshold`.
    ///
    /// A week without any signal yields a curve whose bins are all
    /// undefined.
    #[must_use]
    pub fn compute(&self, week: u32, p_threshold: f64) -> CorrelationCurve {
        let column = self.signals.column(
            week,
            self.index.counties().iter().map(|c| c.fips.as_str()),
        );

        let bins: Vec<BinCorrelation> = (0..self.binner.len())
            .into_par_iter()
            .map(|bin| {
                bin_statistic(
                    self.binner,
                    bin,
                    self.corpus.pairs_in_bin(bin),
                    &column,
                    p_threshold,
                )
            })
            .collect();

        log::debug!(
            "Week {week}: {}/{} bins defined",
            bins.iter().filter(|b| b.value.is_some()).count(),
            bins.len()
        );

        CorrelationCurve {
            week,
            p_threshold,
            bins,
        }
    }
}

/// Correlation statistics of one bin, given the week's signal column
/// aligned with the county index.
#[must_use]
pub fn bin_statistic(
    binner: &DistanceBinner,
    bin: usize,
    pairs: &[CountyPair],
    column: &[Option<f64>],
    p_threshold: f64,
) -> BinCorrelation {
    let samples: Vec<(f64, f64)> = pairs
        .iter()
        .filter_map(|pair| {
            let x = column.get(pair.origin).copied().flatten()?;
            let y = column.get(pair.destination).copied().flatten()?;
            Some((x, y))
        })
        .collect();

    let lower_km = binner.lower(bin).unwrap_or(0.0);
    let upper_km = binner.upper(bin).unwrap_or(lower_km);

    let mut result = BinCorrelation {
        bin,
        lower_km,
        upper_km,
        midpoint_km: (lower_km + upper_km) / 2.0,
        pairs: samples.len(),
        value: None,
        p_value: None,
        significant: None,
        degenerate: None,
    };

    match pearson(&samples) {
        Ok(value) => {
            result.value = Some(value);
            result.p_value = spearman(&samples).ok().and_then(|test| test.p_value);
            result.significant = result.p_value.map(|p| p < p_threshold);
        }
        Err(reason) => {
            log::trace!("Bin {bin} undefined: {reason}");
            result.degenerate = Some(reason);
        }
    }

    result
}
