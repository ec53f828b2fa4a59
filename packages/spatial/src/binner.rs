//! Fixed partition of inter-county distances into bins.
//!
//! Bin `i` covers `(upper[i - 1], upper[i]]`, with bin 0 starting at 0 and
//! absorbing any negative input. Distances above the last bound (the
//! cutoff) belong to no bin.

/// Errors from malformed bin bounds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BinBoundsError {
    /// No bounds were given.
    #[error("distance bins need at least one upper bound")]
    Empty,

    /// A bound is NaN or infinite.
    #[error("bin bound {index} is not finite")]
    NonFinite {
        /// Position of the offending bound.
        index: usize,
    },

    /// The first bound is zero or negative.
    #[error("bin bound {index} must be positive, got {value}")]
    NonPositive {
        /// Position of the offending bound.
        index: usize,
        /// The bound value.
        value: f64,
    },

    /// Bounds are not strictly increasing.
    #[error("bin bound {index} ({value}) does not exceed the previous bound ({previous})")]
    NotIncreasing {
        /// Position of the offending bound.
        index: usize,
        /// The preceding bound.
        previous: f64,
        /// The bound value.
        value: f64,
    },
}

/// Ordered, gapless distance bins defined by their upper bounds in km.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBinner {
    upper: Vec<f64>,
}

impl DistanceBinner {
    /// Creates a binner from strictly increasing positive upper bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BinBoundsError`] if the bounds are empty, non-finite,
    /// non-positive or not strictly increasing.
    pub fn new(upper: Vec<f64>) -> Result<Self, BinBoundsError> {
        if upper.is_empty() {
            return Err(BinBoundsError::Empty);
        }

        for (index, &value) in upper.iter().enumerate() {
            if !value.is_finite() {
                return Err(BinBoundsError::NonFinite { index });
            }
            if index == 0 {
                if value <= 0.0 {
                    return Err(BinBoundsError::NonPositive { index, value });
                }
            } else if value <= upper[index - 1] {
                return Err(BinBoundsError::NotIncreasing {
                    index,
                    previous: upper[index - 1],
                    value,
                });
            }
        }

        Ok(Self { upper })
    }

    /// Upper bounds of the reference layout: 50 km, then every 20 km up to
    /// 970 km, closed by a final bin ending at 1000 km (48 bins).
    #[must_use]
    pub fn reference_bounds() -> Vec<f64> {
        let mut bounds: Vec<f64> = (0..47).map(|i| f64::from(50 + 20 * i)).collect();
        bounds.push(1_000.0);
        bounds
    }

    /// Binner using [`Self::reference_bounds`].
    #[must_use]
    pub fn reference() -> Self {
        Self {
            upper: Self::reference_bounds(),
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upper.len()
    }

    /// Always `false`; a binner has at least one bin.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Largest distance that falls in any bin.
    #[must_use]
    pub fn cutoff(&self) -> f64 {
        self.upper[self.upper.len() - 1]
    }

    /// All upper bounds in order.
    #[must_use]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Lower bound of bin `bin` (0 for the first bin).
    #[must_use]
    pub fn lower(&self, bin: usize) -> Option<f64> {
        match bin {
            0 => Some(0.0),
            _ => self.upper.get(bin - 1).copied(),
        }
        .filter(|_| bin < self.upper.len())
    }

    /// Upper bound of bin `bin`.
    #[must_use]
    pub fn upper(&self, bin: usize) -> Option<f64> {
        self.upper.get(bin).copied()
    }

    /// Center of bin `bin`, used as its x-coordinate when interpolating.
    #[must_use]
    pub fn midpoint(&self, bin: usize) -> Option<f64> {
        Some((self.lower(bin)? + self.upper(bin)?) / 2.0)
    }

    /// Midpoints of every bin in order.
    #[must_use]
    pub fn midpoints(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|b| self.midpoint(b)).collect()
    }

    /// Smallest bin whose upper bound is at least `distance_km`, or `None`
    /// for NaN and distances beyond the cutoff.
    #[must_use]
    pub fn bin_of(&self, distance_km: f64) -> Option<usize> {
        if distance_km.is_nan() || distance_km > self.cutoff() {
            return None;
        }
        Some(self.upper.partition_point(|&upper| upper < distance_km))
    }
}

impl Default for DistanceBinner {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_layout_has_48_bins() {
        let binner = DistanceBinner::reference();
        assert_eq!(binner.len(), 48);
        assert_eq!(binner.upper(0), Some(50.0));
        assert_eq!(binner.upper(1), Some(70.0));
        assert_eq!(binner.upper(46), Some(970.0));
        assert!((binner.cutoff() - 1_000.0).abs() < f64::EPSILON);
        assert_eq!(binner.midpoint(0), Some(25.0));
        assert_eq!(binner.midpoint(47), Some(985.0));
    }

    #[test]
    fn assigns_right_closed_bins() {
        let binner = DistanceBinner::new(vec![10.0, 20.0, 30.0]).unwrap();
        assert_eq!(binner.bin_of(0.0), Some(0));
        assert_eq!(binner.bin_of(-3.0), Some(0));
        assert_eq!(binner.bin_of(10.0), Some(0));
        assert_eq!(binner.bin_of(10.000_001), Some(1));
        assert_eq!(binner.bin_of(20.0), Some(1));
        assert_eq!(binner.bin_of(29.9), Some(2));
        assert_eq!(binner.bin_of(30.0), Some(2));
        assert_eq!(binner.bin_of(30.1), None);
        assert_eq!(binner.bin_of(f64::NAN), None);
    }

    #[test]
    fn bin_of_is_monotonic_and_consistent_with_bounds() {
        let binner = DistanceBinner::reference();
        let mut previous = 0;
        for step in 0..=10_000 {
            let d = f64::from(step) * 0.1;
            let bin = binner.bin_of(d).unwrap();
            assert!(bin >= previous, "bin_of not monotonic at {d}");
            previous = bin;

            let lower = binner.lower(bin).unwrap();
            let upper = binner.upper(bin).unwrap();
            assert!(d <= upper);
            assert!(bin == 0 || d > lower, "{d} not above lower bound {lower}");
        }
    }

    #[test]
    fn bins_are_contiguous() {
        let binner = DistanceBinner::reference();
        for bin in 1..binner.len() {
            assert_eq!(binner.lower(bin), binner.upper(bin - 1));
        }
        assert_eq!(binner.lower(binner.len()), None);
        assert_eq!(binner.midpoint(binner.len()), None);
    }

    #[test]
    fn rejects_malformed_bounds() {
        assert_eq!(DistanceBinner::new(vec![]), Err(BinBoundsError::Empty));
        assert!(matches!(
            DistanceBinner::new(vec![0.0, 10.0]),
            Err(BinBoundsError::NonPositive { index: 0, .. })
        ));
        assert!(matches!(
            DistanceBinner::new(vec![10.0, 10.0]),
            Err(BinBoundsError::NotIncreasing { index: 1, .. })
        ));
        assert!(matches!(
            DistanceBinner::new(vec![10.0, 5.0]),
            Err(BinBoundsError::NotIncreasing { index: 1, .. })
        ));
        assert!(matches!(
            DistanceBinner::new(vec![10.0, f64::INFINITY]),
            Err(BinBoundsError::NonFinite { index: 1 })
        ));
    }
}
