//! SQLite metadata store for captured unknown-person records.
//!
//! One row per record: `{id, descriptor, created_at, image_path}`.
//! Descriptors are stored as raw little-endian f32 blobs. The table is
//! append-only during a run; `load_all` rehydrates the dedup index at
//! startup so restarts do not forget prior sightings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use thiserror::Error;

use snooper_core::Descriptor;

use crate::dedup::UnknownRecord;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },
    #[error("image encode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS captures (
    id          INTEGER PRIMARY KEY,
    descriptor  BLOB NOT NULL,
    created_at  TEXT NOT NULL,
    image_path  TEXT NOT NULL
);
";

/// Handle to the capture metadata database.
pub struct CaptureDb {
    conn: Connection,
}

impl CaptureDb {
    /// Open (creating if needed) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert one record. Fails on a duplicate id.
    pub fn insert(&self, record: &UnknownRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO captures (id, descriptor, created_at, image_path) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id as i64,
                descriptor_to_blob(&record.descriptor),
                record.created_at.to_rfc3339(),
                record.image_path.to_string_lossy().into_owned(),
            ],
        )?;
        Ok(())
    }

    /// Load every record, ordered by id.
    pub fn load_all(&self) -> Result<Vec<UnknownRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, descriptor, created_at, image_path FROM captures ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, blob, created_at, image_path) = row?;

            let descriptor = descriptor_from_blob(&blob).ok_or_else(|| {
                StoreError::CorruptRecord {
                    id,
                    reason: format!("descriptor blob length {} not a multiple of 4", blob.len()),
                }
            })?;

            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| StoreError::CorruptRecord {
                    id,
                    reason: format!("bad timestamp: {e}"),
                })?
                .with_timezone(&Utc);

            records.push(UnknownRecord {
                id: id as u64,
                descriptor,
                created_at,
                image_path: PathBuf::from(image_path),
            });
        }

        Ok(records)
    }
}

fn descriptor_to_blob(descriptor: &Descriptor) -> Vec<u8> {
    let mut blob = Vec::with_capacity(descriptor.len() * 4);
    for value in &descriptor.values {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn descriptor_from_blob(blob: &[u8]) -> Option<Descriptor> {
    if blob.len() % 4 != 0 {
        return None;
    }
    let values = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Some(Descriptor::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, values: &[f32]) -> UnknownRecord {
        UnknownRecord {
            id,
            descriptor: Descriptor::new(values.to_vec()),
            created_at: Utc::now(),
            image_path: PathBuf::from(format!("/tmp/captures/{id:06}.png")),
        }
    }

    #[test]
    fn test_blob_codec_roundtrip() {
        let descriptor = Descriptor::new(vec![0.5, -1.25, 3.0e-4, 0.0]);
        let blob = descriptor_to_blob(&descriptor);
        assert_eq!(blob.len(), 16);
        let back = descriptor_from_blob(&blob).unwrap();
        assert_eq!(back.values, descriptor.values);
    }

    #[test]
    fn test_blob_bad_length() {
        assert!(descriptor_from_blob(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_insert_and_load_roundtrip() {
        let db = CaptureDb::open_in_memory().unwrap();
        db.insert(&record(1, &[0.1, 0.2])).unwrap();
        db.insert(&record(2, &[0.3, 0.4])).unwrap();

        let records = db.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].descriptor.values, vec![0.3, 0.4]);
        assert_eq!(
            records[0].image_path,
            PathBuf::from("/tmp/captures/000001.png")
        );
    }

    #[test]
    fn test_load_ordered_by_id() {
        let db = CaptureDb::open_in_memory().unwrap();
        db.insert(&record(5, &[0.0])).unwrap();
        db.insert(&record(2, &[0.0])).unwrap();
        db.insert(&record(9, &[0.0])).unwrap();

        let ids: Vec<u64> = db.load_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = CaptureDb::open_in_memory().unwrap();
        db.insert(&record(1, &[0.0])).unwrap();
        assert!(db.insert(&record(1, &[1.0])).is_err());
    }

    #[test]
    fn test_empty_db_loads_nothing() {
        let db = CaptureDb::open_in_memory().unwrap();
        assert!(db.load_all().unwrap().is_empty());
    }
}
