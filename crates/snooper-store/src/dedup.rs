//! Dedup store — previously captured unknown persons.
//!
//! Wraps a `SimilarityIndex` over every captured descriptor, backed by
//! the SQLite metadata db and a directory of PNG face crops. The store
//! is owned by exactly one thread; `is_duplicate` followed by
//! `record_new` therefore executes as one uninterrupted sequence, which
//! is what keeps two sightings of the same new person in adjacent
//! frames from both being recorded.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use snooper_core::{Descriptor, DistanceMetric, FaceCrop, Neighbor, SimilarityIndex};

use crate::db::{CaptureDb, StoreError};

/// A captured unknown person. Created once, never mutated, never
/// deleted within a run.
#[derive(Debug, Clone)]
pub struct UnknownRecord {
    pub id: u64,
    pub descriptor: Descriptor,
    pub created_at: DateTime<Utc>,
    pub image_path: PathBuf,
}

/// Mutable gallery of captured unknowns with durable backing.
pub struct DedupStore {
    threshold: f32,
    captures_dir: PathBuf,
    db: CaptureDb,
    index: SimilarityIndex<u64>,
    next_id: u64,
    unpersisted: u64,
}

impl DedupStore {
    /// Open the store, rehydrating the index from the metadata db so a
    /// restart still classifies previously captured faces as duplicates.
    pub fn open(
        db: CaptureDb,
        captures_dir: PathBuf,
        metric: DistanceMetric,
        threshold: f32,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&captures_dir)?;

        let records = db.load_all()?;
        let mut index = SimilarityIndex::new(metric);
        let mut next_id = 1u64;

        for record in &records {
            index.insert(record.id, record.descriptor.clone());
            next_id = next_id.max(record.id + 1);
        }

        tracing::info!(
            records = records.len(),
            captures_dir = %captures_dir.display(),
            "dedup store opened"
        );

        Ok(Self {
            threshold,
            captures_dir,
            db,
            index,
            next_id,
            unpersisted: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Records that could not be written to durable storage this run.
    pub fn unpersisted(&self) -> u64 {
        self.unpersisted
    }

    /// Closest captured record, whatever its distance.
    pub fn nearest(&self, probe: &Descriptor) -> Option<Neighbor<u64>> {
        self.index.nearest(probe)
    }

    /// Closest captured record within the threshold, if any.
    pub fn matches(&self, probe: &Descriptor) -> Option<Neighbor<u64>> {
        self.nearest(probe).filter(|n| n.distance <= self.threshold)
    }

    /// Has a face this close been captured before?
    pub fn is_duplicate(&self, probe: &Descriptor) -> bool {
        self.matches(probe).is_some()
    }

    /// Record a new unknown person: assign the next id, persist the face
    /// crop and metadata, and insert into the index.
    ///
    /// Persistence gets one retry; if it still fails the record is kept
    /// in memory anyway (so the person is not re-captured every frame),
    /// the failure is logged at error level, and `unpersisted` is
    /// incremented. In-memory state is at-most-once; the on-disk copy of
    /// such a record is lost on restart.
    pub fn record_new(&mut self, descriptor: Descriptor, crop: &FaceCrop) -> UnknownRecord {
        let id = self.next_id;
        self.next_id += 1;

        let record = UnknownRecord {
            id,
            descriptor: descriptor.clone(),
            created_at: Utc::now(),
            image_path: self.captures_dir.join(format!("{id:06}.png")),
        };

        if let Err(err) = self.persist(&record, crop) {
            tracing::error!(
                id,
                image_path = %record.image_path.display(),
                error = %err,
                "failed to persist new capture; keeping it in memory only"
            );
            self.unpersisted += 1;
        }

        self.index.insert(id, descriptor);
        record
    }

    fn persist(&self, record: &UnknownRecord, crop: &FaceCrop) -> Result<(), StoreError> {
        if let Err(err) = write_crop(record, crop) {
            tracing::warn!(id = record.id, error = %err, "crop write failed, retrying once");
            write_crop(record, crop)?;
        }
        self.db.insert(record)
    }
}

fn write_crop(record: &UnknownRecord, crop: &FaceCrop) -> Result<(), StoreError> {
    let image = image::GrayImage::from_raw(crop.width, crop.height, crop.data.clone())
        .ok_or_else(|| {
            StoreError::CorruptRecord {
                id: record.id as i64,
                reason: format!(
                    "crop buffer length {} does not match {}x{}",
                    crop.data.len(),
                    crop.width,
                    crop.height
                ),
            }
        })?;
    image.save(&record.image_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop() -> FaceCrop {
        FaceCrop { data: vec![90u8; 16], width: 4, height: 4 }
    }

    fn store(dir: &std::path::Path) -> DedupStore {
        DedupStore::open(
            CaptureDb::open_in_memory().unwrap(),
            dir.to_path_buf(),
            DistanceMetric::Cosine,
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn test_record_then_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let d = Descriptor::new(vec![1.0, 0.0]);
        assert!(!store.is_duplicate(&d));

        let record = store.record_new(d.clone(), &crop());
        assert_eq!(record.id, 1);
        assert!(store.is_duplicate(&d));
        // Slightly different sighting of the same person still matches.
        assert!(store.is_duplicate(&Descriptor::new(vec![0.98, 0.05])));
        // A very different face does not.
        assert!(!store.is_duplicate(&Descriptor::new(vec![-1.0, 0.0])));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let a = store.record_new(Descriptor::new(vec![1.0, 0.0]), &crop());
        let b = store.record_new(Descriptor::new(vec![0.0, 1.0]), &crop());
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_crop_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        let record = store.record_new(Descriptor::new(vec![1.0, 0.0]), &crop());
        assert!(record.image_path.exists());
        assert_eq!(store.unpersisted(), 0);

        let loaded = image::open(&record.image_path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (4, 4));
    }

    #[test]
    fn test_rehydration_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("captures.db");
        let d = Descriptor::new(vec![0.0, 1.0]);

        {
            let mut store = DedupStore::open(
                CaptureDb::open(&db_path).unwrap(),
                dir.path().join("captures"),
                DistanceMetric::Cosine,
                0.5,
            )
            .unwrap();
            store.record_new(d.clone(), &crop());
        }

        let mut store = DedupStore::open(
            CaptureDb::open(&db_path).unwrap(),
            dir.path().join("captures"),
            DistanceMetric::Cosine,
            0.5,
        )
        .unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.is_duplicate(&d));
        // Next id continues after the rehydrated records.
        let next = store.record_new(Descriptor::new(vec![1.0, 0.0]), &crop());
        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_persistence_failure_keeps_record_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(dir.path());

        // Buffer length disagrees with the dimensions, so the PNG encode
        // fails on both attempts.
        let bad_crop = FaceCrop { data: vec![0u8; 3], width: 4, height: 4 };
        let d = Descriptor::new(vec![1.0, 0.0]);
        let record = store.record_new(d.clone(), &bad_crop);

        assert_eq!(record.id, 1);
        assert_eq!(store.unpersisted(), 1);
        // The person is still deduplicated for the rest of the run.
        assert!(store.is_duplicate(&d));
    }
}
