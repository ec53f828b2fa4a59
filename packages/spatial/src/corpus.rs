//! All ordered county pairs within the distance cutoff.
//!
//! Candidate pairs come from an R-tree over unit-sphere embeddings of the
//! county centroids: the straight-line chord between two points on the
//! sphere grows monotonically with their great-circle distance, so a
//! Euclidean radius query with the chord matching the cutoff returns a
//! superset of the pairs we need. The exact haversine distance then
//! decides membership.

use rayon::prelude::*;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::binner::DistanceBinner;
use crate::index::{EARTH_RADIUS_KM, GeoIndex};

type SpherePoint = GeomWithData<[f64; 3], usize>;

/// Relative slack added to the chord query radius so that pairs sitting
/// exactly on the cutoff survive floating-point round-off.
const QUERY_SLACK: f64 = 1e-9;

/// One directed county pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountyPair {
    /// Position of the origin county in the [`GeoIndex`].
    pub origin: usize,
    /// Position of the destination county in the [`GeoIndex`].
    pub destination: usize,
    /// Great-circle distance in kilometers.
    pub distance_km: f64,
    /// Distance bin index.
    pub bin: usize,
}

/// Immutable set of directed county pairs grouped by distance bin.
///
/// Both `(i, j)` and `(j, i)` are stored. Within a bin, pairs are ordered
/// by origin and then destination.
#[derive(Debug, Clone)]
pub struct PairwiseCorpus {
    bins: Vec<Vec<CountyPair>>,
    cutoff_km: f64,
    total: usize,
}

impl PairwiseCorpus {
    /// Materializes every directed pair of distinct counties whose distance
    /// does not exceed the binner's cutoff.
    #[must_use]
    pub fn build(index: &GeoIndex, binner: &DistanceBinner) -> Self {
        let cutoff_km = binner.cutoff();
        let points: Vec<[f64; 3]> = index
            .counties()
            .iter()
            .map(|c| unit_vector(c.lon, c.lat))
            .collect();

        let tree = RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(i, p)| SpherePoint::new(*p, i))
                .collect(),
        );

        let chord = chord_for_distance(cutoff_km) * (1.0 + QUERY_SLACK);
        let max_sq = chord * chord;

        let per_origin: Vec<Vec<CountyPair>> = (0..points.len())
            .into_par_iter()
            .map(|origin| {
                let mut pairs: Vec<CountyPair> = tree
                    .locate_within_distance(points[origin], max_sq)
                    .filter(|candidate| candidate.data != origin)
                    .filter_map(|candidate| {
                        let destination = candidate.data;
                        let distance_km = index.distance(origin, destination);
                        binner.bin_of(distance_km).map(|bin| CountyPair {
                            origin,
                            destination,
                            distance_km,
                            bin,
                        })
                    })
                    .collect();
                pairs.sort_unstable_by_key(|p| p.destination);
                pairs
            })
            .collect();

        let mut bins: Vec<Vec<CountyPair>> = vec![Vec::new(); binner.len()];
        let mut total = 0;
        for pair in per_origin.into_iter().flatten() {
            bins[pair.bin].push(pair);
            total += 1;
        }

        log::info!(
            "Pairwise corpus: {total} directed pairs within {cutoff_km} km across {} bins ({} counties)",
            bins.len(),
            index.len()
        );

        Self {
            bins,
            cutoff_km,
            total,
        }
    }

    /// Pairs assigned to bin `bin`; empty for an out-of-range bin.
    #[must_use]
    pub fn pairs_in_bin(&self, bin: usize) -> &[CountyPair] {
        self.bins.get(bin).map_or(&[][..], Vec::as_slice)
    }

    /// Every pair, bin by bin.
    pub fn all_pairs(&self) -> impl Iterator<Item = &CountyPair> {
        self.bins.iter().flatten()
    }

    /// Number of bins the corpus was built with.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Pair count per bin.
    #[must_use]
    pub fn counts_per_bin(&self) -> Vec<usize> {
        self.bins.iter().map(Vec::len).collect()
    }

    /// Distance cutoff in kilometers.
    #[must_use]
    pub const fn cutoff_km(&self) -> f64 {
        self.cutoff_km
    }

    /// Total number of directed pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.total
    }

    /// Whether the corpus holds no pairs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Embeds a `(lon, lat)` coordinate in degrees on the unit sphere.
fn unit_vector(lon: f64, lat: f64) -> [f64; 3] {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Unit-sphere chord length spanning a great-circle distance.
fn chord_for_distance(distance_km: f64) -> f64 {
    let angle = (distance_km / EARTH_RADIUS_KM).min(std::f64::consts::PI);
    2.0 * (angle / 2.0).sin()
}

#[cfg(test)]
mod tests {
    use covid_corr_geography_models::{County, Region};

    use super::*;

    fn county(fips: &str, lon: f64, lat: f64) -> County {
        County {
            fips: fips.to_string(),
            name: fips.to_string(),
            region: Region::West,
            land_area_sq_mi: None,
            lon,
            lat,
            population: 50_000,
        }
    }

    /// Four counties one degree apart along the equator (~111.2 km).
    fn line_of_four() -> GeoIndex {
        GeoIndex::from_counties((0..4).map(|i| county(&format!("0100{i}"), f64::from(i), 0.0)))
    }

    fn brute_force(index: &GeoIndex, binner: &DistanceBinner) -> Vec<(usize, usize, usize)> {
        let mut pairs = Vec::new();
        for origin in 0..index.len() {
            for destination in 0..index.len() {
                if origin == destination {
                    continue;
                }
                if let Some(bin) = binner.bin_of(index.distance(origin, destination)) {
                    pairs.push((bin, origin, destination));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn line_of_four_pairs_and_bins() {
        let index = line_of_four();
        let binner = DistanceBinner::new(vec![150.0, 250.0, 350.0]).unwrap();
        let corpus = PairwiseCorpus::build(&index, &binner);

        assert_eq!(corpus.len(), 12);
        assert_eq!(corpus.counts_per_bin(), vec![6, 4, 2]);
        assert!(corpus.all_pairs().all(|p| p.origin != p.destination));

        let far: Vec<_> = corpus
            .pairs_in_bin(2)
            .iter()
            .map(|p| (p.origin, p.destination))
            .collect();
        assert_eq!(far, vec![(0, 3), (3, 0)]);
    }

    #[test]
    fn cutoff_excludes_far_pairs_entirely() {
        let index = line_of_four();
        let binner = DistanceBinner::new(vec![150.0, 300.0]).unwrap();
        let corpus = PairwiseCorpus::build(&index, &binner);

        assert_eq!(corpus.len(), 10);
        assert!(corpus.all_pairs().all(|p| p.distance_km <= 300.0));
        assert!(corpus.pairs_in_bin(5).is_empty());
    }

    #[test]
    fn pairs_are_stored_in_both_directions() {
        let index = line_of_four();
        let corpus = PairwiseCorpus::build(&index, &DistanceBinner::new(vec![400.0]).unwrap());
        for pair in corpus.all_pairs() {
            assert!(corpus.all_pairs().any(|q| q.origin == pair.destination
                && q.destination == pair.origin
                && (q.distance_km - pair.distance_km).abs() < 1e-9));
        }
    }

    #[test]
    fn matches_brute_force_on_grid() {
        let counties = (0..12).flat_map(|i| {
            (0..10).map(move |j| {
                county(
                    &format!("{:05}", i * 10 + j + 1),
                    -120.0 + 3.7 * f64::from(i),
                    25.0 + 2.3 * f64::from(j),
                )
            })
        });
        let index = GeoIndex::from_counties(counties);
        let binner = DistanceBinner::reference();
        let corpus = PairwiseCorpus::build(&index, &binner);

        let mut actual: Vec<_> = corpus
            .all_pairs()
            .map(|p| (p.bin, p.origin, p.destination))
            .collect();
        actual.sort_unstable();

        assert_eq!(actual, brute_force(&index, &binner));
    }

    #[test]
    fn empty_universe_builds_empty_corpus() {
        let corpus = PairwiseCorpus::build(&GeoIndex::default(), &DistanceBinner::reference());
        assert!(corpus.is_empty());
        assert_eq!(corpus.bin_count(), 48);
    }

    #[test]
    fn chord_is_monotonic() {
        assert!(chord_for_distance(0.0).abs() < f64::EPSILON);
        assert!(chord_for_distance(100.0) < chord_for_distance(1_000.0));
        assert!((chord_for_distance(1e9) - 2.0).abs() < 1e-12);
    }
}
