#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-county, per-week case-growth signal.
//!
//! Raw daily case/death counts are bucketed into fixed-length periods
//! anchored at a start date, normalized by county population and
//! first-differenced into the signal X_T that the correlation engine
//! consumes. See [`stages`] for the individual transformation steps and
//! [`WeeklySignalTable`] for the assembled lookup structure.

pub mod stages;
pub mod table;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use table::{WeekTotals, WeeklySignalTable};

/// Errors from signal table construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// Bucket width of zero days.
    #[error("bucket width must be at least one day")]
    ZeroBucketWidth,
}

/// Width of the time buckets the daily records are grouped into.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Granularity {
    /// Seven-day buckets.
    #[default]
    Weekly,
    /// Thirty-day buckets.
    Monthly,
}

impl Granularity {
    /// Bucket width in days.
    #[must_use]
    pub const fn days(self) -> u32 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

/// One row of the raw daily case/death stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    /// Reporting date.
    pub date: NaiveDate,
    /// County identity as it appears in the source (may be unpadded).
    pub fips: String,
    /// New cases reported on this date.
    pub cases: i64,
    /// New deaths reported on this date.
    pub deaths: i64,
}

/// Parameters shared by every construction stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalOptions {
    /// First day of bucket 1. Earlier records are dropped.
    pub anchor: NaiveDate,
    /// Bucket width in days.
    pub bucket_days: u32,
    /// Counties with a smaller population are excluded.
    pub min_population: u64,
}

impl SignalOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::ZeroBucketWidth`] for a zero bucket width.
    pub const fn validate(&self) -> Result<(), SignalError> {
        if self.bucket_days == 0 {
            return Err(SignalError::ZeroBucketWidth);
        }
        Ok(())
    }

    /// First calendar day of bucket `week` (1-based).
    #[must_use]
    pub fn bucket_start(&self, week: u32) -> Option<NaiveDate> {
        let offset = u64::from(week.checked_sub(1)?) * u64::from(self.bucket_days);
        self.anchor.checked_add_days(chrono::Days::new(offset))
    }
}

/// The signal for one county in one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySignal {
    /// Five-digit county FIPS code.
    pub fips: String,
    /// 1-based bucket index.
    pub week: u32,
    /// Cases summed over the bucket.
    pub cases: i64,
    /// Deaths summed over the bucket.
    pub deaths: i64,
    /// Cases divided by the bucket width.
    pub cases_per_day: f64,
    /// Deaths divided by the bucket width.
    pub deaths_per_day: f64,
    /// County population used for normalization.
    pub population: u64,
    /// `cases_per_day / population`.
    pub fraction: f64,
    /// X_T: `fraction` minus the county's previous observed fraction
    /// (zero before the first observation).
    pub delta: f64,
}
