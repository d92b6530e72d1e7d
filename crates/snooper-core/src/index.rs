//! Nearest-neighbor index over face descriptors.
//!
//! Linear scan over a growing `Vec` — adequate for tens to low thousands
//! of entries. The `insert`/`nearest` contract is the seam for swapping
//! in a spatial index later without touching callers.

use serde::{Deserialize, Serialize};

use crate::types::Descriptor;

/// Distance metric fixed at index construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in [0, 2]. The default for L2-normalized
    /// encoder output.
    Cosine,
    /// Plain Euclidean distance.
    Euclidean,
}

impl DistanceMetric {
    pub fn distance(&self, a: &Descriptor, b: &Descriptor) -> f32 {
        match self {
            DistanceMetric::Cosine => a.cosine_distance(b),
            DistanceMetric::Euclidean => a.euclidean_distance(b),
        }
    }
}

/// The single closest entry for a query, with its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<K> {
    pub key: K,
    pub distance: f32,
}

/// Growing collection of descriptors keyed by caller-supplied handles.
///
/// Thresholding is the caller's job: `nearest` reports the closest entry
/// whatever its distance. All mutation goes through `&mut self`, so a
/// single owning thread sees every query as a consistent snapshot.
pub struct SimilarityIndex<K> {
    metric: DistanceMetric,
    entries: Vec<(K, Descriptor)>,
}

impl<K: Copy> SimilarityIndex<K> {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric, entries: Vec::new() }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a descriptor under the given key. Keys are not deduplicated;
    /// the caller guarantees one insert per record.
    pub fn insert(&mut self, key: K, descriptor: Descriptor) {
        self.entries.push((key, descriptor));
    }

    /// Return the closest entry and its distance, or `None` when empty.
    ///
    /// Always scans every entry (no early exit on a perfect match).
    pub fn nearest(&self, probe: &Descriptor) -> Option<Neighbor<K>> {
        let mut best: Option<Neighbor<K>> = None;

        for (key, descriptor) in &self.entries {
            let distance = self.metric.distance(probe, descriptor);
            let better = match &best {
                None => true,
                Some(b) => distance < b.distance,
            };
            if better {
                best = Some(Neighbor { key: *key, distance });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(values: &[f32]) -> Descriptor {
        Descriptor::new(values.to_vec())
    }

    #[test]
    fn test_empty_index_has_no_neighbor() {
        let index: SimilarityIndex<u64> = SimilarityIndex::new(DistanceMetric::Cosine);
        assert!(index.nearest(&d(&[1.0, 0.0])).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_nearest_picks_closest() {
        let mut index = SimilarityIndex::new(DistanceMetric::Cosine);
        index.insert(1u64, d(&[0.0, 1.0]));
        index.insert(2u64, d(&[1.0, 0.0]));
        index.insert(3u64, d(&[0.0, -1.0]));

        let hit = index.nearest(&d(&[0.9, 0.1])).unwrap();
        assert_eq!(hit.key, 2);
        assert!(hit.distance < 0.1);
    }

    #[test]
    fn test_nearest_scans_all_entries() {
        // Best match inserted last must still win.
        let mut index = SimilarityIndex::new(DistanceMetric::Cosine);
        index.insert(1u64, d(&[0.0, 1.0]));
        index.insert(2u64, d(&[0.0, -1.0]));
        index.insert(3u64, d(&[1.0, 0.0]));

        let hit = index.nearest(&d(&[1.0, 0.0])).unwrap();
        assert_eq!(hit.key, 3);
        assert!(hit.distance.abs() < 1e-6);
    }

    #[test]
    fn test_growth_without_rebuild() {
        let mut index = SimilarityIndex::new(DistanceMetric::Euclidean);
        for i in 0..100u64 {
            index.insert(i, d(&[i as f32, 0.0]));
        }
        assert_eq!(index.len(), 100);

        let hit = index.nearest(&d(&[42.2, 0.0])).unwrap();
        assert_eq!(hit.key, 42);
        assert!((hit.distance - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_euclidean_metric() {
        let mut index = SimilarityIndex::new(DistanceMetric::Euclidean);
        index.insert(7u64, d(&[3.0, 4.0]));
        let hit = index.nearest(&d(&[0.0, 0.0])).unwrap();
        assert!((hit.distance - 5.0).abs() < 1e-6);
    }
}
