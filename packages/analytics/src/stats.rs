//! Correlation statistics over paired samples.
//!
//! Moments use population normalization (divide by n, not n - 1). The
//! rank test follows the usual Spearman construction: average ranks for
//! ties, Pearson on the ranks, and a two-sided p-value from Student's t
//! with n - 2 degrees of freedom.

use covid_corr_analytics_models::DegenerateBin;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// First and second moments of a paired sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Sample size.
    pub n: usize,
    /// Mean of the first sequence.
    pub mean_x: f64,
    /// Mean of the second sequence.
    pub mean_y: f64,
    /// Population variance of the first sequence.
    pub var_x: f64,
    /// Population variance of the second sequence.
    pub var_y: f64,
    /// Population covariance, `mean(x * y) - mean(x) * mean(y)`.
    pub cov: f64,
}

/// Result of a Spearman rank-correlation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankTest {
    /// Spearman's rho.
    pub rho: f64,
    /// Two-sided p-value; `None` with fewer than three observations.
    pub p_value: Option<f64>,
}

/// Two-pass population moments. Returns `None` for an empty sample.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn moments(pairs: &[(f64, f64)]) -> Option<Moments> {
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut var_x, mut var_y, mut cov) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        var_x += dx * dx;
        var_y += dy * dy;
        cov += dx * dy;
    }

    Some(Moments {
        n: pairs.len(),
        mean_x,
        mean_y,
        var_x: var_x / n,
        var_y: var_y / n,
        cov: cov / n,
    })
}

/// Population-normalized Pearson correlation, `cov / sqrt(var_x * var_y)`.
///
/// # Errors
///
/// Returns [`DegenerateBin`] for fewer than two pairs or a constant
/// sequence.
pub fn pearson(pairs: &[(f64, f64)]) -> Result<f64, DegenerateBin> {
    if pairs.len() < 2 {
        return Err(DegenerateBin::InsufficientPairs { pairs: pairs.len() });
    }
    if is_constant(pairs.iter().map(|p| p.0)) || is_constant(pairs.iter().map(|p| p.1)) {
        return Err(DegenerateBin::ZeroVariance);
    }

    let m = moments(pairs).ok_or(DegenerateBin::InsufficientPairs { pairs: 0 })?;
    let denominator = (m.var_x * m.var_y).sqrt();
    if !(denominator > 0.0 && denominator.is_finite()) {
        return Err(DegenerateBin::ZeroVariance);
    }

    Ok((m.cov / denominator).clamp(-1.0, 1.0))
}

/// Spearman rank correlation with a two-sided significance test.
///
/// # Errors
///
/// Returns [`DegenerateBin`] under the same conditions as [`pearson`].
#[allow(clippy::cast_precision_loss)]
pub fn spearman(pairs: &[(f64, f64)]) -> Result<RankTest, DegenerateBin> {
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let ranked: Vec<(f64, f64)> = average_ranks(&xs)
        .into_iter()
        .zip(average_ranks(&ys))
        .collect();

    let rho = pearson(&ranked)?;
    let n = pairs.len();
    if n < 3 {
        return Ok(RankTest { rho, p_value: None });
    }

    if rho.abs() >= 1.0 {
        return Ok(RankTest {
            rho,
            p_value: Some(0.0),
        });
    }

    let df = (n - 2) as f64;
    let t = rho * (df / ((1.0 - rho) * (1.0 + rho))).sqrt();
    let p_value = StudentsT::new(0.0, 1.0, df)
        .ok()
        .map(|dist| (2.0 * dist.sf(t.abs())).min(1.0));

    Ok(RankTest { rho, p_value })
}

/// 1-based ranks with ties sharing the mean of their positions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = rank;
        }
        start = end + 1;
    }
    ranks
}

fn is_constant(mut values: impl Iterator<Item = f64>) -> bool {
    values
        .next()
        .is_none_or(|first| values.all(|v| v == first))
}
