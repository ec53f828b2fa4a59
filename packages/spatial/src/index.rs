//! County universe with great-circle distance lookups.

use std::collections::BTreeMap;

use covid_corr_geography_models::{County, CountyRecord, DataGap, GapReason};
use geo::{Distance as _, Haversine, Point};

/// Mean Earth radius used by [`Haversine`], in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Great-circle distance in kilometers between two `(lon, lat)` pairs in
/// degrees.
#[must_use]
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    Haversine.distance(Point::new(a.0, a.1), Point::new(b.0, b.1)) / 1_000.0
}

/// The validated county universe for one analysis run.
///
/// Counties are addressed either by FIPS code or by their dense position
/// in the index; positions are what the pairwise corpus and the weekly
/// signal columns use.
#[derive(Debug, Clone, Default)]
pub struct GeoIndex {
    counties: Vec<County>,
    by_fips: BTreeMap<String, usize>,
}

impl GeoIndex {
    /// Builds the index from raw reference rows.
    ///
    /// Rows failing validation (population floor, coordinates, region) or
    /// repeating an identity already seen are returned as [`DataGap`]s.
    #[must_use]
    pub fn from_records(
        records: impl IntoIterator<Item = CountyRecord>,
        min_population: u64,
    ) -> (Self, Vec<DataGap>) {
        let mut index = Self::default();
        let mut gaps = Vec::new();

        for record in records {
            if index.by_fips.contains_key(&record.fips) {
                gaps.push(DataGap::new(record.fips, GapReason::DuplicateIdentity));
                continue;
            }
            match record.validate(min_population) {
                Ok(county) => index.push(county),
                Err(gap) => {
                    log::debug!("Excluding county: {gap}");
                    gaps.push(gap);
                }
            }
        }

        log::info!(
            "County universe: {} counties included, {} excluded",
            index.len(),
            gaps.len()
        );

        (index, gaps)
    }

    /// Builds the index from already validated counties. Later duplicates
    /// of an identity are dropped.
    #[must_use]
    pub fn from_counties(counties: impl IntoIterator<Item = County>) -> Self {
        let mut index = Self::default();
        for county in counties {
            if !index.by_fips.contains_key(&county.fips) {
                index.push(county);
            }
        }
        index
    }

    fn push(&mut self, county: County) {
        self.by_fips.insert(county.fips.clone(), self.counties.len());
        self.counties.push(county);
    }

    /// Number of counties in the universe.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counties.len()
    }

    /// Whether the universe is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    /// All counties in position order.
    #[must_use]
    pub fn counties(&self) -> &[County] {
        &self.counties
    }

    /// County at a dense position.
    #[must_use]
    pub fn county(&self, position: usize) -> Option<&County> {
        self.counties.get(position)
    }

    /// Dense position of a county by FIPS code.
    #[must_use]
    pub fn position(&self, fips: &str) -> Option<usize> {
        self.by_fips.get(fips).copied()
    }

    /// County by FIPS code.
    #[must_use]
    pub fn get(&self, fips: &str) -> Option<&County> {
        self.position(fips).and_then(|i| self.counties.get(i))
    }

    /// Great-circle distance in kilometers between the counties at
    /// positions `a` and `b`.
    ///
    /// # Panics
    ///
    /// Panics if either position is out of range.
    #[must_use]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        let (a, b) = (&self.counties[a], &self.counties[b]);
        haversine_km((a.lon, a.lat), (b.lon, b.lat))
    }

    /// Great-circle distance between two counties by FIPS code, or `None`
    /// if either is not in the universe.
    #[must_use]
    pub fn distance_between(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.distance(self.position(a)?, self.position(b)?))
    }
}
