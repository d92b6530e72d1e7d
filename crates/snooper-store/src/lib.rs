//! snooper-store — Whitelist and dedup galleries with durable backing.
//!
//! The whitelist is a static in-memory gallery; the dedup store pairs an
//! in-memory similarity index with a SQLite metadata db and a directory
//! of captured face crops, rehydrated at startup.

pub mod db;
pub mod dedup;
pub mod whitelist;

pub use db::{CaptureDb, StoreError};
pub use dedup::{DedupStore, UnknownRecord};
pub use whitelist::{IdentityRecord, WhitelistMatch, WhitelistStore};
