//! Correlation-length estimates from a correlation curve.
//!
//! Two estimates are extracted independently:
//!
//! * the zero crossing of the piecewise-linear interpolant through the
//!   defined bins, located with Brent's bracketed method;
//! * the midpoint of the first bin whose correlation is no longer
//!   statistically significant.

use covid_corr_analytics_models::{CorrelationCurve, CorrelationLength, RootNotFound};

/// Absolute x tolerance of the bracketed search.
const X_TOLERANCE: f64 = 2e-12;

/// Relative x tolerance of the bracketed search.
const REL_TOLERANCE: f64 = 4.0 * f64::EPSILON;

const MAX_ITERATIONS: usize = 100;

/// Extracts correlation lengths from a [`CorrelationCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationLengthSolver {
    tolerance: f64,
}

impl Default for CorrelationLengthSolver {
    fn default() -> Self {
        Self { tolerance: 1e-8 }
    }
}

impl CorrelationLengthSolver {
    /// Creates a solver that accepts a root only if `|C(root)| <= tolerance`.
    #[must_use]
    pub const fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Largest accepted residual at the root.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Both estimates for one curve. Either may be undefined; the other is
    /// still reported.
    #[must_use]
    pub fn solve(&self, curve: &CorrelationCurve) -> CorrelationLength {
        let flags: Vec<(f64, Option<bool>)> = curve
            .bins
            .iter()
            .map(|b| (b.midpoint_km, b.significant))
            .collect();

        CorrelationLength::from_results(
            self.interpolation_length(&curve.defined_points()),
            significance_length(&flags),
        )
    }

    /// First zero crossing of the piecewise-linear interpolant through
    /// `points` (`(x, C)`, undefined bins already removed).
    ///
    /// The search is confined to `[min x, max x]`; a curve that would
    /// only cross zero beyond its last point has no root.
    ///
    /// # Errors
    ///
    /// * [`RootNotFound::InsufficientPoints`] with fewer than two points.
    /// * [`RootNotFound::NoSignChange`] if no adjacent pair brackets zero.
    /// * [`RootNotFound::ToleranceNotMet`] if the residual at the returned
    ///   point exceeds the tolerance.
    pub fn interpolation_length(&self, points: &[(f64, f64)]) -> Result<f64, RootNotFound> {
        let mut points: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if points.len() < 2 {
            return Err(RootNotFound::InsufficientPoints {
                points: points.len(),
            });
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (lo, hi) = first_bracket(&points).ok_or(RootNotFound::NoSignChange)?;
        let interpolant = |x: f64| interpolate(&points, x);
        let root = if lo == hi {
            lo
        } else {
            brent(interpolant, lo, hi)?
        };

        let residual = interpolant(root).abs();
        if residual > self.tolerance {
            log::debug!("Root at {root:.3} km rejected, residual {residual:e}");
            return Err(RootNotFound::ToleranceNotMet { residual });
        }
        Ok(root)
    }
}

/// Midpoint of the first bin, by increasing distance, whose significance
/// flag is `false`. `flags` are `(midpoint, significant)` in bin order.
///
/// # Errors
///
/// * [`RootNotFound::InsufficientPoints`] if fewer than two bins carry a
///   flag.
/// * [`RootNotFound::NoSignificanceTransition`] if every flag is `true`.
pub fn significance_length(flags: &[(f64, Option<bool>)]) -> Result<f64, RootNotFound> {
    let defined: Vec<(f64, bool)> = flags
        .iter()
        .filter_map(|&(x, flag)| flag.map(|f| (x, f)))
        .collect();
    if defined.len() < 2 {
        return Err(RootNotFound::InsufficientPoints {
            points: defined.len(),
        });
    }

    defined
        .iter()
        .find(|(_, significant)| !significant)
        .map(|&(x, _)| x)
        .ok_or(RootNotFound::NoSignificanceTransition)
}

/// Bounds of the first sign change in x order. A point that is exactly
/// zero is returned as a degenerate bracket `(x, x)`.
fn first_bracket(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    for (i, &(x, y)) in points.iter().enumerate() {
        if y == 0.0 {
            return Some((x, x));
        }
        match points.get(i + 1) {
            Some(&(next_x, next_y)) if next_y != 0.0 && y.signum() != next_y.signum() => {
                return Some((x, next_x));
            }
            _ => {}
        }
    }
    None
}

/// Piecewise-linear interpolation through `points` (sorted by x), clamped
/// to the end values outside the sampled range.
#[allow(clippy::float_cmp)]
fn interpolate(points: &[(f64, f64)], x: f64) -> f64 {
    let upper = points.partition_point(|p| p.0 < x);
    match upper {
        0 => points[0].1,
        n if n == points.len() => points[n - 1].1,
        n => {
            let (x0, y0) = points[n - 1];
            let (x1, y1) = points[n];
            if x1 == x0 {
                y1
            } else {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        }
    }
}

/// Brent's root finder on `[a, b]`, which must bracket a sign change.
///
/// Combines bisection, secant and inverse quadratic interpolation steps;
/// always keeps the root bracketed.
#[allow(clippy::many_single_char_names, clippy::float_cmp)]
fn brent(f: impl Fn(f64) -> f64, a: f64, b: f64) -> Result<f64, RootNotFound> {
    let (mut x_pre, mut x_cur) = (a, b);
    let (mut f_pre, mut f_cur) = (f(x_pre), f(x_cur));

    if f_pre == 0.0 {
        return Ok(x_pre);
    }
    if f_cur == 0.0 {
        return Ok(x_cur);
    }
    if f_pre.signum() == f_cur.signum() {
        return Err(RootNotFound::NoSignChange);
    }

    let (mut x_blk, mut f_blk) = (0.0, 0.0);
    let (mut s_pre, mut s_cur) = (0.0, 0.0);

    for _ in 0..MAX_ITERATIONS {
        if f_pre != 0.0 && f_cur != 0.0 && f_pre.signum() != f_cur.signum() {
            x_blk = x_pre;
            f_blk = f_pre;
            s_pre = x_cur - x_pre;
            s_cur = s_pre;
        }
        if f_blk.abs() < f_cur.abs() {
            x_pre = x_cur;
            x_cur = x_blk;
            x_blk = x_pre;
            f_pre = f_cur;
            f_cur = f_blk;
            f_blk = f_pre;
        }

        let delta = (X_TOLERANCE + REL_TOLERANCE * x_cur.abs()) / 2.0;
        let s_bis = (x_blk - x_cur) / 2.0;
        if f_cur == 0.0 || s_bis.abs() < delta {
            return Ok(x_cur);
        }

        if s_pre.abs() > delta && f_cur.abs() < f_pre.abs() {
            let s_try = if x_pre == x_blk {
                -f_cur * (x_cur - x_pre) / (f_cur - f_pre)
            } else {
                let d_pre = (f_pre - f_cur) / (x_pre - x_cur);
                let d_blk = (f_blk - f_cur) / (x_blk - x_cur);
                -f_cur * (f_blk * d_blk - f_pre * d_pre) / (d_blk * d_pre * (f_blk - f_pre))
            };
            if 2.0 * s_try.abs() < s_pre.abs().min(3.0 * s_bis.abs() - delta) {
                s_pre = s_cur;
                s_cur = s_try;
            } else {
                s_pre = s_bis;
                s_cur = s_bis;
            }
        } else {
            s_pre = s_bis;
            s_cur = s_bis;
        }

        x_pre = x_cur;
        f_pre = f_cur;
        if s_cur.abs() > delta {
            x_cur += s_cur;
        } else {
            x_cur += if s_bis > 0.0 { delta } else { -delta };
        }
        f_cur = f(x_cur);
    }

    Err(RootNotFound::NoConvergence)
}

#[cfg(test)]
mod tests {
    use covid_corr_analytics_models::BinCorrelation;

    use super::*;

    fn solver() -> CorrelationLengthSolver {
        CorrelationLengthSolver::default()
    }

    #[test]
    fn finds_crossing_of_decreasing_curve() {
        let points: Vec<(f64, f64)> = [25.0, 75.0, 125.0, 175.0, 225.0]
            .into_iter()
            .map(|x| (x, (137.3 - x) / 50.0))
            .collect();
        let root = solver().interpolation_length(&points).unwrap();
        assert!((root - 137.3).abs() < 1e-8);
    }

    #[test]
    fn brent_converges_on_a_curved_function() {
        let root = brent(|x| x.mul_add(x, -2.0), 0.0, 2.0).unwrap();
        assert!((root - 2.0_f64.sqrt()).abs() < 1e-10);

        let root = brent(|x: f64| x.cos() - x, 0.0, 1.0).unwrap();
        assert!((root.cos() - root).abs() < 1e-10);
    }

    #[test]
    fn interpolant_root_between_nonlinear_samples() {
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let x = 25.0 + 50.0 * f64::from(i);
                (x, (-x / 300.0).exp() - 0.2)
            })
            .collect();
        let root = solver().interpolation_length(&points).unwrap();
        // True root is 300 ln 5 ~ 482.8; the linear interpolant overshoots
        // slightly but stays inside the bracketing segment.
        assert!(root > 475.0 && root < 525.0);
        assert!(interpolate(&points, root).abs() < 1e-8);
    }

    #[test]
    fn takes_first_of_several_crossings() {
        let points = [(10.0, 0.5), (30.0, -0.5), (50.0, 0.5), (70.0, -0.5)];
        let root = solver().interpolation_length(&points).unwrap();
        assert!((root - 20.0).abs() < 1e-9);
    }

    #[test]
    fn exact_zero_point_is_a_root() {
        let points = [(10.0, 0.4), (30.0, 0.0), (50.0, 0.3)];
        assert_eq!(solver().interpolation_length(&points), Ok(30.0));
    }

    #[test]
    fn no_crossing_is_undefined() {
        let points = [(10.0, 0.9), (30.0, 0.5), (50.0, 0.1)];
        assert_eq!(
            solver().interpolation_length(&points),
            Err(RootNotFound::NoSignChange)
        );
    }

    #[test]
    fn too_few_points() {
        assert_eq!(
            solver().interpolation_length(&[(10.0, -0.2)]),
            Err(RootNotFound::InsufficientPoints { points: 1 })
        );
        assert_eq!(
            solver().interpolation_length(&[]),
            Err(RootNotFound::InsufficientPoints { points: 0 })
        );
    }

    #[test]
    fn interpolate_clamps_outside_range() {
        let points = [(0.0, 1.0), (10.0, 3.0)];
        assert!((interpolate(&points, -5.0) - 1.0).abs() < f64::EPSILON);
        assert!((interpolate(&points, 5.0) - 2.0).abs() < f64::EPSILON);
        assert!((interpolate(&points, 50.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn significance_picks_first_non_significant_bin() {
        let flags = [
            (25.0, Some(true)),
            (60.0, None),
            (80.0, Some(true)),
            (100.0, Some(false)),
            (120.0, Some(true)),
            (140.0, Some(false)),
        ];
        assert_eq!(significance_length(&flags), Ok(100.0));
    }

    #[test]
    fn significance_undefined_cases() {
        assert_eq!(
            significance_length(&[(25.0, Some(true)), (60.0, Some(true))]),
            Err(RootNotFound::NoSignificanceTransition)
        );
        assert_eq!(
            significance_length(&[(25.0, Some(false)), (60.0, None)]),
            Err(RootNotFound::InsufficientPoints { points: 1 })
        );
    }

    #[test]
    fn solve_reports_both_estimates_independently() {
        let bin = |i: u32, value: Option<f64>, significant: Option<bool>| BinCorrelation {
            bin: i as usize,
            lower_km: 20.0 * f64::from(i),
            upper_km: 20.0 * f64::from(i + 1),
            midpoint_km: 20.0 * f64::from(i) + 10.0,
            pairs: 10,
            value,
            p_value: significant.map(|s| if s { 0.0 } else { 0.5 }),
            significant,
            degenerate: None,
        };
        let curve = CorrelationCurve {
            week: 12,
            p_threshold: 0.01,
            bins: vec![
                bin(0, Some(0.8), Some(true)),
                bin(1, Some(0.4), Some(true)),
                bin(2, Some(0.1), Some(false)),
                bin(3, None, None),
            ],
        };

        let length = solver().solve(&curve);
        assert_eq!(length.interpolation_km, None);
        assert_eq!(length.interpolation_failure, Some(RootNotFound::NoSignChange));
        assert_eq!(length.significance_km, Some(50.0));
        assert_eq!(length.significance_failure, None);
    }
}
