#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial correlation engine.
//!
//! Given the county universe, the distance partition and the weekly
//! signal table, computes the correlation curve C(r, T) for a week
//! ([`CorrelationEstimator`]), extracts the two correlation-length
//! estimates from it ([`CorrelationLengthSolver`]) and runs both over a
//! range of weeks in parallel ([`WeeklyBatchRunner`]). [`Analysis`] wires
//! the whole pipeline together from raw inputs.

pub mod batch;
pub mod estimator;
pub mod pipeline;
pub mod progress;
pub mod solver;
pub mod stats;

use covid_corr_analytics_models::ConfigError;
use covid_corr_signal::SignalError;
use covid_corr_spatial::BinBoundsError;
use thiserror::Error;

pub use batch::WeeklyBatchRunner;
pub use estimator::CorrelationEstimator;
pub use pipeline::Analysis;
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use solver::CorrelationLengthSolver;

/// Fatal errors that stop an analysis before any week is computed.
///
/// Per-bin and per-week failures are never surfaced here; they are
/// recorded on the affected bin or week instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid run configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid distance bin layout.
    #[error("Invalid distance bins: {0}")]
    Bins(#[from] BinBoundsError),

    /// Signal table could not be built.
    #[error("Signal construction failed: {0}")]
    Signal(#[from] SignalError),

    /// A requested week lies outside the data or the configured range.
    #[error("Week {week} has no data")]
    UnknownWeek {
        /// Requested week index.
        week: u32,
    },
}
