#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typed CSV loaders for the analysis inputs and exporters for its
//! results.
//!
//! Loaders accept any [`std::io::Read`] so they can be exercised from
//! memory; the `*_path` variants open files and attach the path to every
//! error. Malformed rows are skipped and logged, never turned into zeros.

pub mod counties;
pub mod daily;
pub mod export;
pub mod population;

use std::fs::File;
use std::path::Path;

pub use counties::{parse_counties, read_counties};
pub use daily::{parse_daily, read_daily};
pub use population::{parse_population, read_population};

/// Errors from reading inputs or writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// CSV parsing or writing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File the error occurred in.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error opening or writing a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File the error occurred in.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent from the header row.
    #[error("Missing column {column} in {path}")]
    MissingColumn {
        /// File being read.
        path: String,
        /// Name of the absent column.
        column: String,
    },
}

impl IngestError {
    fn csv(path: &str, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_string(),
            source,
        }
    }

    /// Replaces the path recorded in the error.
    #[must_use]
    pub fn at(self, path: &Path) -> Self {
        let path = path.display().to_string();
        match self {
            Self::Csv { source, .. } => Self::Csv { path, source },
            Self::Io { source, .. } => Self::Io { path, source },
            Self::MissingColumn { column, .. } => Self::MissingColumn { path, column },
            other @ Self::Json(_) => other,
        }
    }
}

/// Opens a file for reading, attaching the path to any error.
fn open(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Creates (or truncates) a file for writing, attaching the path to any
/// error.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the file cannot be created.
pub fn create(path: &Path) -> Result<File, IngestError> {
    File::create(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
