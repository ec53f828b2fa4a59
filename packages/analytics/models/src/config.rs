//! Run configuration for the correlation analysis.
//!
//! Every tunable of the analysis lives in [`AnalysisConfig`]. It is read
//! from TOML (all keys optional), possibly overridden from the command
//! line, and validated once before any data is touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fatal configuration problems detected before computation starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a config.
    #[error("Invalid configuration file: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// A p-value threshold outside `(0, 1)`.
    #[error("{name} must lie in (0, 1), got {value}")]
    InvalidThreshold {
        /// Name of the offending setting.
        name: &'static str,
        /// The configured value.
        value: f64,
    },

    /// Root tolerance that is not a positive finite number.
    #[error("root_tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),

    /// Week indices are 1-based.
    #[error("week indices start at 1, got {0}")]
    ZeroWeek(u32),

    /// First week after last week.
    #[error("first_week ({first}) is after last_week ({last})")]
    InvertedWeekRange {
        /// Configured first week.
        first: u32,
        /// Configured last week.
        last: u32,
    },

    /// Bucket width of zero days.
    #[error("bucket_days must be at least 1")]
    ZeroBucketWidth,

    /// Bin bounds that are not strictly increasing positive numbers.
    #[error("Invalid distance bins: {message}")]
    InvalidBins {
        /// Description of the problem.
        message: String,
    },
}

/// All parameters of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// First day of week 1. Records dated earlier are dropped.
    pub anchor_date: NaiveDate,
    /// Bucket width in days (7 for weekly, 30 for monthly).
    pub bucket_days: u32,
    /// Counties below this population are excluded.
    pub min_population: u64,
    /// Upper bounds of the distance bins in km. `None` selects the
    /// reference layout (50 km, 70 km, ..., 970 km, 1000 km).
    pub bin_upper_bounds_km: Option<Vec<f64>>,
    /// First week of the batch. Defaults to the first week with data.
    pub first_week: Option<u32>,
    /// Last week of the batch (inclusive). Defaults to the last week with
    /// data.
    pub last_week: Option<u32>,
    /// Weeks with fewer observed counties are skipped as warm-up.
    pub min_observed_counties: usize,
    /// Spearman p-value threshold for the single-week curve.
    pub single_week_p_threshold: f64,
    /// Spearman p-value threshold for the weekly batch.
    pub batch_p_threshold: f64,
    /// Largest accepted |C(root)| for the interpolated correlation length.
    pub root_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            anchor_date: NaiveDate::from_ymd_opt(2020, 1, 22).unwrap_or_default(),
            bucket_days: 7,
            min_population: 10_000,
            bin_upper_bounds_km: None,
            first_week: None,
            last_week: None,
            min_observed_counties: 22,
            single_week_p_threshold: 1e-6,
            batch_p_threshold: 1e-2,
            root_tolerance: 1e-8,
        }
    }
}

impl AnalysisConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed or
    /// contains unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Checks every setting that does not depend on the input data.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold("single_week_p_threshold", self.single_week_p_threshold)?;
        validate_threshold("batch_p_threshold", self.batch_p_threshold)?;

        if !(self.root_tolerance.is_finite() && self.root_tolerance > 0.0) {
            return Err(ConfigError::InvalidTolerance(self.root_tolerance));
        }
        if self.bucket_days == 0 {
            return Err(ConfigError::ZeroBucketWidth);
        }

        for week in [self.first_week, self.last_week].into_iter().flatten() {
            if week == 0 {
                return Err(ConfigError::ZeroWeek(week));
            }
        }
        match (self.first_week, self.last_week) {
            (Some(first), Some(last)) if first > last => {
                return Err(ConfigError::InvertedWeekRange { first, last });
            }
            _ => {}
        }

        if let Some(bounds) = &self.bin_upper_bounds_km {
            validate_bounds(bounds)?;
        }

        Ok(())
    }
}

fn validate_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}

fn validate_bounds(bounds: &[f64]) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::InvalidBins { message });

    if bounds.is_empty() {
        return invalid("at least one upper bound is required".to_string());
    }
    if let Some(bad) = bounds.iter().find(|b| !b.is_finite() || **b <= 0.0) {
        return invalid(format!("bound {bad} is not a positive finite distance"));
    }
    if let Some(w) = bounds.windows(2).find(|w| w[1] <= w[0]) {
        return invalid(format!("bound {} does not exceed {}", w[1], w[0]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bucket_days, 7);
        assert_eq!(config.min_population, 10_000);
        assert!((config.single_week_p_threshold - 1e-6).abs() < f64::EPSILON);
        assert!((config.batch_p_threshold - 1e-2).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_partial_toml() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            anchor_date = "2020-03-01"
            first_week = 5
            last_week = 152
            bin_upper_bounds_km = [100.0, 200.0, 500.0]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.anchor_date,
            NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
        );
        assert_eq!(config.first_week, Some(5));
        assert_eq!(config.last_week, Some(152));
        assert_eq!(config.bin_upper_bounds_km, Some(vec![100.0, 200.0, 500.0]));
        assert_eq!(config.min_observed_counties, 22);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("cutoff = 3"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_bad_thresholds() {
        let config = AnalysisConfig {
            batch_p_threshold: 0.0,
            ..AnalysisConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                name: "batch_p_threshold",
                value: 0.0
            })
        );

        let config = AnalysisConfig {
            single_week_p_threshold: f64::NAN,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_week_range() {
        let config = AnalysisConfig {
            first_week: Some(10),
            last_week: Some(3),
            ..AnalysisConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedWeekRange { first: 10, last: 3 })
        );

        let config = AnalysisConfig {
            first_week: Some(0),
            ..AnalysisConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWeek(0)));
    }

    #[test]
    fn rejects_malformed_bins() {
        for bounds in [vec![], vec![-1.0, 5.0], vec![10.0, 10.0], vec![10.0, f64::NAN]] {
            let config = AnalysisConfig {
                bin_upper_bounds_km: Some(bounds),
                ..AnalysisConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidBins { .. })
            ));
        }
    }

    #[test]
    fn rejects_zero_bucket_and_bad_tolerance() {
        let config = AnalysisConfig {
            bucket_days: 0,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBucketWidth));

        let config = AnalysisConfig {
            root_tolerance: -1.0,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTolerance(-1.0)));
    }
}
