#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial layer of the correlation pipeline.
//!
//! Holds the county universe ([`GeoIndex`]), the fixed partition of
//! inter-county distances ([`DistanceBinner`]) and the set of all ordered
//! county pairs within the distance cutoff ([`PairwiseCorpus`]). All three
//! are built once per run and shared read-only across the per-week
//! workers.

pub mod binner;
pub mod corpus;
pub mod index;

pub use binner::{BinBoundsError, DistanceBinner};
pub use corpus::{CountyPair, PairwiseCorpus};
pub use index::{EARTH_RADIUS_KM, GeoIndex, haversine_km};
