//! Per-detection classification: whitelist → dedup → capture.

use snooper_core::{Descriptor, FaceCrop};
use snooper_store::{DedupStore, WhitelistStore};

/// Terminal state for one detection. Only `NewUnknown` has a side
/// effect (a record persisted and inserted into the dedup gallery).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Whitelisted { label: String, distance: f32 },
    DuplicateUnknown { id: u64, distance: f32 },
    NewUnknown { id: u64 },
}

/// Classification pipeline over the two galleries.
///
/// Owns both stores for the lifetime of the run; the watch loop holds
/// the only reference, so the dedup query-then-insert in `classify`
/// never interleaves with another classification.
pub struct Pipeline {
    whitelist: WhitelistStore,
    dedup: DedupStore,
}

impl Pipeline {
    pub fn new(whitelist: WhitelistStore, dedup: DedupStore) -> Self {
        Self { whitelist, dedup }
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Classify an encoded face.
    ///
    /// The whitelist check strictly precedes the dedup check: a known
    /// person is never captured as an unknown, even when their
    /// descriptor happens to sit closer to a previously captured record
    /// than to their own whitelist entry.
    pub fn classify(&mut self, descriptor: &Descriptor, crop: &FaceCrop) -> Outcome {
        if let Some(hit) = self.whitelist.matches(descriptor) {
            return Outcome::Whitelisted {
                label: hit.label.to_string(),
                distance: hit.distance,
            };
        }

        if let Some(neighbor) = self.dedup.matches(descriptor) {
            return Outcome::DuplicateUnknown {
                id: neighbor.key,
                distance: neighbor.distance,
            };
        }

        let record = self.dedup.record_new(descriptor.clone(), crop);
        Outcome::NewUnknown { id: record.id }
    }
}
