#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! County reference types shared by every stage of the correlation
//! pipeline.
//!
//! A [`County`] is the unit of spatial analysis: a FIPS identity, a
//! centroid and a population. Counties are loaded once per run and never
//! mutated afterwards.

pub mod fips;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Census region containing a county's state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    /// New England and Mid-Atlantic divisions.
    Northeast,
    /// East and West North Central divisions.
    Midwest,
    /// South Atlantic, East and West South Central divisions.
    South,
    /// Mountain and Pacific divisions.
    West,
    /// State could not be resolved (territories, malformed labels).
    Unknown,
}

/// A county as loaded from the reference table, before validation.
///
/// Every attribute except the identity may be missing in raw data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyRecord {
    /// Five-digit zero-padded county FIPS code.
    pub fips: String,
    /// County name (e.g. "Cook County").
    pub name: String,
    /// Census region of the containing state.
    pub region: Region,
    /// Land area in square miles.
    pub land_area_sq_mi: Option<f64>,
    /// Centroid longitude in degrees.
    pub centroid_lon: Option<f64>,
    /// Centroid latitude in degrees.
    pub centroid_lat: Option<f64>,
    /// Resident population.
    pub population: Option<u64>,
}

/// A validated county in the analysis universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct County {
    /// Five-digit zero-padded county FIPS code.
    pub fips: String,
    /// County name.
    pub name: String,
    /// Census region of the containing state. Never [`Region::Unknown`].
    pub region: Region,
    /// Land area in square miles, if known.
    pub land_area_sq_mi: Option<f64>,
    /// Centroid longitude in degrees, within [-180, 180].
    pub lon: f64,
    /// Centroid latitude in degrees, within [-90, 90].
    pub lat: f64,
    /// Resident population, at least the configured floor.
    pub population: u64,
}

/// Why a county was left out of a computation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GapReason {
    /// No population figure available.
    MissingPopulation,
    /// Population below the configured minimum.
    BelowPopulationFloor,
    /// Centroid missing, non-finite or out of range.
    InvalidCoordinates,
    /// Containing region could not be resolved.
    UnknownRegion,
    /// Identity could not be normalized to a FIPS code.
    UnresolvableIdentity,
    /// Appears more than once in the reference table.
    DuplicateIdentity,
}

/// A county excluded from the analysis, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("data gap for county {fips}: {reason}")]
pub struct DataGap {
    /// County identity as seen in the input.
    pub fips: String,
    /// Why the county was excluded.
    pub reason: GapReason,
}

impl DataGap {
    /// Creates a gap record for `fips`.
    #[must_use]
    pub fn new(fips: impl Into<String>, reason: GapReason) -> Self {
        Self {
            fips: fips.into(),
            reason,
        }
    }
}

impl CountyRecord {
    /// Validates a raw record against the population floor and coordinate
    /// ranges.
    ///
    /// # Errors
    ///
    /// Returns a [`DataGap`] describing the first failed check.
    pub fn validate(self, min_population: u64) -> Result<County, DataGap> {
        if self.region == Region::Unknown {
            return Err(DataGap::new(self.fips, GapReason::UnknownRegion));
        }

        let Some(population) = self.population else {
            return Err(DataGap::new(self.fips, GapReason::MissingPopulation));
        };
        if population < min_population {
            return Err(DataGap::new(self.fips, GapReason::BelowPopulationFloor));
        }

        let (Some(lon), Some(lat)) = (self.centroid_lon, self.centroid_lat) else {
            return Err(DataGap::new(self.fips, GapReason::InvalidCoordinates));
        };
        if !valid_coordinates(lon, lat) {
            return Err(DataGap::new(self.fips, GapReason::InvalidCoordinates));
        }

        Ok(County {
            fips: self.fips,
            name: self.name,
            region: self.region,
            land_area_sq_mi: self.land_area_sq_mi,
            lon,
            lat,
            population,
        })
    }
}

/// Returns whether `(lon, lat)` is a finite coordinate within range.
#[must_use]
pub fn valid_coordinates(lon: f64, lat: f64) -> bool {
    lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CountyRecord {
        CountyRecord {
            fips: "17031".to_string(),
            name: "Cook County".to_string(),
            region: Region::Midwest,
            land_area_sq_mi: Some(945.3),
            centroid_lon: Some(-87.8),
            centroid_lat: Some(41.8),
            population: Some(5_150_233),
        }
    }

    #[test]
    fn validates_complete_record() {
        let county = record().validate(10_000).unwrap();
        assert_eq!(county.fips, "17031");
        assert_eq!(county.population, 5_150_233);
    }

    #[test]
    fn rejects_small_population() {
        let mut r = record();
        r.population = Some(9_999);
        assert_eq!(
            r.validate(10_000).unwrap_err().reason,
            GapReason::BelowPopulationFloor
        );
    }

    #[test]
    fn floor_is_inclusive() {
        let mut r = record();
        r.population = Some(10_000);
        assert!(r.validate(10_000).is_ok());
    }

    #[test]
    fn rejects_missing_population() {
        let mut r = record();
        r.population = None;
        assert_eq!(
            r.validate(10_000).unwrap_err().reason,
            GapReason::MissingPopulation
        );
    }

    #[test]
    fn rejects_bad_coordinates() {
        let mut r = record();
        r.centroid_lat = Some(f64::NAN);
        assert_eq!(
            r.validate(10_000).unwrap_err().reason,
            GapReason::InvalidCoordinates
        );

        let mut r = record();
        r.centroid_lon = Some(181.0);
        assert_eq!(
            r.validate(10_000).unwrap_err().reason,
            GapReason::InvalidCoordinates
        );

        let mut r = record();
        r.centroid_lon = None;
        assert_eq!(
            r.validate(10_000).unwrap_err().reason,
            GapReason::InvalidCoordinates
        );
    }

    #[test]
    fn rejects_unknown_region() {
        let mut r = record();
        r.region = Region::Unknown;
        assert_eq!(
            r.validate(10_000).unwrap_err().reason,
            GapReason::UnknownRegion
        );
    }

    #[test]
    fn region_string_roundtrip() {
        assert_eq!(Region::Northeast.to_string(), "NORTHEAST");
        assert_eq!("WEST".parse::<Region>().unwrap(), Region::West);
    }

    #[test]
    fn gap_displays_reason() {
        let gap = DataGap::new("01001", GapReason::MissingPopulation);
        assert_eq!(gap.to_string(), "data gap for county 01001: missing_population");
    }
}
