//! Whitelist gallery — the static set of known identities.

use snooper_core::{Descriptor, DistanceMetric, SimilarityIndex};

/// A labeled reference face loaded at startup.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub label: String,
    pub descriptor: Descriptor,
}

/// Result of a positive whitelist lookup.
#[derive(Debug, Clone)]
pub struct WhitelistMatch<'a> {
    pub label: &'a str,
    pub distance: f32,
}

/// Read-only gallery of known identities.
///
/// Loaded once before the frame loop starts and never mutated during
/// operation; reloading is an administrative restart.
pub struct WhitelistStore {
    threshold: f32,
    records: Vec<IdentityRecord>,
    index: SimilarityIndex<usize>,
}

impl WhitelistStore {
    pub fn new(records: Vec<IdentityRecord>, metric: DistanceMetric, threshold: f32) -> Self {
        let mut index = SimilarityIndex::new(metric);
        for (i, record) in records.iter().enumerate() {
            index.insert(i, record.descriptor.clone());
        }
        Self { threshold, records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Nearest whitelist entry within the threshold, if any.
    pub fn matches(&self, probe: &Descriptor) -> Option<WhitelistMatch<'_>> {
        let neighbor = self.index.nearest(probe)?;
        if neighbor.distance <= self.threshold {
            Some(WhitelistMatch {
                label: &self.records[neighbor.key].label,
                distance: neighbor.distance,
            })
        } else {
            None
        }
    }

    pub fn is_whitelisted(&self, probe: &Descriptor) -> bool {
        self.matches(probe).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, values: &[f32]) -> IdentityRecord {
        IdentityRecord {
            label: label.to_string(),
            descriptor: Descriptor::new(values.to_vec()),
        }
    }

    #[test]
    fn test_match_within_threshold() {
        let store = WhitelistStore::new(
            vec![record("alice", &[1.0, 0.0]), record("bob", &[0.0, 1.0])],
            DistanceMetric::Cosine,
            0.6,
        );

        let hit = store.matches(&Descriptor::new(vec![0.95, 0.05])).unwrap();
        assert_eq!(hit.label, "alice");
        assert!(hit.distance < 0.1);
    }

    #[test]
    fn test_no_match_beyond_threshold() {
        let store = WhitelistStore::new(
            vec![record("alice", &[1.0, 0.0])],
            DistanceMetric::Cosine,
            0.6,
        );
        // Opposite direction: distance 2.0
        assert!(!store.is_whitelisted(&Descriptor::new(vec![-1.0, 0.0])));
    }

    #[test]
    fn test_empty_store_never_matches() {
        let store = WhitelistStore::new(vec![], DistanceMetric::Cosine, 0.6);
        assert!(store.is_empty());
        assert!(store.matches(&Descriptor::new(vec![1.0, 0.0])).is_none());
    }

    #[test]
    fn test_closest_label_wins() {
        let store = WhitelistStore::new(
            vec![record("alice", &[1.0, 0.0]), record("carol", &[0.7, 0.7])],
            DistanceMetric::Cosine,
            0.6,
        );
        let hit = store.matches(&Descriptor::new(vec![0.72, 0.69])).unwrap();
        assert_eq!(hit.label, "carol");
    }
}
