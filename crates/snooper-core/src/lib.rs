//! snooper-core — Face detection, encoding, and similarity matching.
//!
//! Uses UltraFace for face detection and an ArcFace-style encoder for
//! face descriptors, both running via ONNX Runtime for CPU inference.
//! The `SimilarityIndex` answers nearest-neighbor queries for the
//! whitelist and dedup galleries built on top of it.

pub mod detector;
pub mod encoder;
pub mod imageops;
pub mod index;
pub mod types;

pub use detector::{DetectorError, FaceDetector};
pub use encoder::{EncoderError, FaceEncoder};
pub use index::{DistanceMetric, Neighbor, SimilarityIndex};
pub use types::{BoundingBox, Descriptor, Detect, Encode, FaceCrop};
